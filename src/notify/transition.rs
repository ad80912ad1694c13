//! moves issues along their workflow by transition name

use super::{NotifyError, Receiver};

impl Receiver {
	/// Executes the transition named `state` on the issue `key`.
	///
	/// Fails with [NotifyError::Transition] if the workflow doesn't offer a
	/// transition of that name to us, retrying won't help in that case.
	pub(super) async fn do_transition(&self, key: &str, state: &str) -> Result<(), NotifyError> {
		let transitions = self.client.get_transitions(key).await?;

		let transition = match transitions.iter().find(|transition| transition.name == state) {
			Some(transition) => transition,
			None => {
				return Err(NotifyError::Transition { state: state.to_owned(), key: key.to_owned() })
			}
		};

		tracing::debug!("transition {state} of {key} (transition id {})", transition.id);
		self.client.do_transition(key, &transition.id).await?;

		tracing::debug!("issue {key} transitioned to {state}");
		Ok(())
	}
}
