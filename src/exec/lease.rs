// ABOUTME: Per-command ownership of an execution session.
// ABOUTME: Reuses a pre-opened session or creates one, and releases it when the command scope ends.

use crate::ssh::{Result, Transport};

/// Exclusive hold on the session used by one command.
///
/// Acquiring empties the connection's session slot, so the session lives
/// exactly as long as the lease: every exit path of the command, including
/// a dropped future, releases it and no later command can observe it.
pub(crate) struct SessionLease<S> {
    session: S,
}

impl<S> SessionLease<S> {
    /// Take the session parked in `slot`, or open a new one on `transport`.
    pub(crate) async fn acquire<T>(slot: &mut Option<S>, transport: &T) -> Result<Self>
    where
        T: Transport<Session = S>,
    {
        let session = match slot.take() {
            Some(session) => {
                tracing::debug!("Reusing pre-opened execution session");
                session
            }
            None => transport.create_session().await?,
        };
        Ok(Self { session })
    }

    pub(crate) fn session(&mut self) -> &mut S {
        &mut self.session
    }
}

impl<S> Drop for SessionLease<S> {
    fn drop(&mut self) {
        tracing::debug!("Releasing execution session");
    }
}

/// Make sure `slot` holds a session, creating one if it is empty.
pub(crate) async fn ensure_session<'a, T: Transport>(
    slot: &'a mut Option<T::Session>,
    transport: &T,
) -> Result<&'a mut T::Session> {
    let session = match slot.take() {
        Some(session) => session,
        None => transport.create_session().await?,
    };
    Ok(slot.insert(session))
}
