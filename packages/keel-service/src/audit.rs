use tracing::warn;

use crate::KeelService;

impl KeelService {
	/// Opens the audit thread for a call. Best-effort: any failure (or a
	/// missing audit configuration) yields `None` and normal operation
	/// continues unchanged. The provider's own timeout bounds the wait.
	pub(crate) async fn open_audit_thread(&self, call_id: &str) -> Option<String> {
		let audit = self.deps.audit.as_ref()?;

		match audit.create_thread(call_id).await {
			Ok(thread_id) => Some(thread_id),
			Err(err) => {
				warn!(%call_id, %err, "Audit thread creation failed.");

				None
			},
		}
	}

	/// Dispatches one trace message on a detached task. Fire-and-forget: the
	/// task owns its error handling, so neither latency nor failure of the
	/// audit service can be observed by the caller.
	pub(crate) fn audit_append(&self, thread_id: &Option<String>, label: &'static str, content: String) {
		let (Some(audit), Some(thread_id)) = (self.deps.audit.clone(), thread_id.clone()) else {
			return;
		};

		tokio::spawn(async move {
			if let Err(err) = audit.append(&thread_id, label, &content).await {
				warn!(%thread_id, label, %err, "Audit append failed.");
			}
		});
	}
}
