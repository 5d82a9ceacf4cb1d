// ==========================================
// 表格导入系统 - 引擎层
// ==========================================
// 职责: 异步导入任务调度与进度跟踪
// 红线: Engine 不拼 SQL, 行级处理全部委托给 BatchRun
// ==========================================

pub mod job_tracker;

pub use job_tracker::{JobHandle, JobTracker};
