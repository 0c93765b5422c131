use crate::snapshot::Snapshot;

/// Read-only work performed against a fresh working copy.
///
/// Actions run on a pool worker while the key's reader lock is held. They
/// receive a [`Snapshot`] rather than the handle, so they cannot trigger a
/// refresh or write to the working copy through this layer.
pub trait ReadAction: Send + 'static {
	type Output: Send + 'static;

	fn read(&self, snapshot: &Snapshot<'_>) -> quarry_git::Result<Self::Output>;
}

impl<F, T> ReadAction for F
where
	F: Fn(&Snapshot<'_>) -> quarry_git::Result<T> + Send + 'static,
	T: Send + 'static,
{
	type Output = T;

	fn read(&self, snapshot: &Snapshot<'_>) -> quarry_git::Result<T> {
		self(snapshot)
	}
}

/// Pins a closure's argument type so it can be passed as a [`ReadAction`]
/// without annotating the snapshot parameter.
///
/// ```no_run
/// # use quarry_access::action;
/// let readme = action(|snapshot| snapshot.read_text("README.md"));
/// ```
pub fn action<F, T>(f: F) -> F
where
	F: Fn(&Snapshot<'_>) -> quarry_git::Result<T> + Send + 'static,
	T: Send + 'static,
{
	f
}
