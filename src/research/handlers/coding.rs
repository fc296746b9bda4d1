use crate::core::AgentError;
use crate::research::action::CodingAction;
use crate::research::loop_::{Researcher, StepOutcome};
use crate::research::session::Session;

impl Researcher {
    /// 没有沙箱执行环境，选择 coding 即为不可恢复错误
    pub(crate) async fn handle_coding(
        &self,
        session: &mut Session,
        action: CodingAction,
    ) -> Result<StepOutcome, AgentError> {
        tracing::error!(total_step = session.total_step, issue = %action.coding_issue, "coding action chosen");
        Err(AgentError::CodingNotImplemented)
    }
}
