//! Macros for wiring host methods to action names.

/// Build an [`Actions`](crate::host::Actions) registry that maps each listed
/// name to the host method of the same name.
///
/// Methods take `(&self, &mut Context, &Invocation)` and return
/// `Result<(), ActionError>`.
///
/// # Example
///
/// ```
/// use runstate::actions;
/// use runstate::host::{ActionError, Context, Host, Invocation};
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// #[derive(Default)]
/// struct Counter {
///     value: AtomicUsize,
/// }
///
/// impl Counter {
///     fn increment(&self, _ctx: &mut Context, _call: &Invocation<'_>) -> Result<(), ActionError> {
///         self.value.fetch_add(1, Ordering::SeqCst);
///         Ok(())
///     }
///
///     fn reset(&self, _ctx: &mut Context, _call: &Invocation<'_>) -> Result<(), ActionError> {
///         self.value.store(0, Ordering::SeqCst);
///         Ok(())
///     }
/// }
///
/// let actions = actions!(Counter::default() => { increment, reset });
/// assert!(actions.provides("increment"));
/// assert!(!actions.provides("decrement"));
/// ```
///
/// Use `shared` to keep a handle to the host:
///
/// ```
/// # use runstate::actions;
/// # use runstate::host::{ActionError, Context, Invocation};
/// # use std::sync::Arc;
/// # struct Lamp;
/// # impl Lamp {
/// #     fn on(&self, _: &mut Context, _: &Invocation<'_>) -> Result<(), ActionError> { Ok(()) }
/// # }
/// let lamp = Arc::new(Lamp);
/// let actions = actions!(shared lamp.clone() => { on });
/// ```
#[macro_export]
macro_rules! actions {
    (shared $host:expr => { $($name:ident),* $(,)? }) => {
        $crate::host::Actions::shared($host)
            $(.on(stringify!($name), |host, ctx, call| host.$name(ctx, call)))*
    };
    ($host:expr => { $($name:ident),* $(,)? }) => {
        $crate::host::Actions::new($host)
            $(.on(stringify!($name), |host, ctx, call| host.$name(ctx, call)))*
    };
}
