use crate::{
    schema::Direction,
    source::{MethodDecl, Modifiers, ParamDecl},
};

/// Decides which Parcel a method parameter travels in.
///
/// Implemented for plain closures, so a caller can override the rule without a new type:
///
/// ```rust
/// use parcelscope::{
///     schema::Direction,
///     source::{MethodDecl, ParamDecl},
///     Loader,
/// };
///
/// // Treat every parameter as both directions
/// let loader =
///     Loader::new().with_direction_policy(|_: &MethodDecl, _: &ParamDecl| Direction::InOut);
/// ```
pub trait DirectionPolicy: Send + Sync {
    /// Direction of `param` in `method`.
    fn direction(&self, method: &MethodDecl, param: &ParamDecl) -> Direction;
}

impl<F> DirectionPolicy for F
where
    F: Fn(&MethodDecl, &ParamDecl) -> Direction + Send + Sync,
{
    fn direction(&self, method: &MethodDecl, param: &ParamDecl) -> Direction {
        self(method, param)
    }
}

/// The default rule: the `out` and `inout` keywords select their direction, anything else
/// is `in`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ModifierPolicy;

impl DirectionPolicy for ModifierPolicy {
    fn direction(&self, _method: &MethodDecl, param: &ParamDecl) -> Direction {
        if param.modifiers.contains(Modifiers::INOUT) {
            Direction::InOut
        } else if param.modifiers.contains(Modifiers::OUT) {
            Direction::Out
        } else {
            Direction::In
        }
    }
}
