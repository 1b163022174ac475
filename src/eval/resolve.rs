//! Turning variables, filter expressions and tag arguments into values.

use super::Context;
use crate::ast::expr::{Argument, FilterExpression, Variable, VariableKind};
use crate::ast::value::Value;
use crate::error::RenderError;

impl Variable {
    /// Literals resolve to themselves; lookups fail with
    /// `VariableDoesNotExist` when any segment of the path is missing.
    pub fn resolve(&self, ctx: &Context) -> Result<Value, RenderError> {
        match &self.kind {
            VariableKind::Literal(value) => Ok(value.clone()),
            VariableKind::Lookup(path) => ctx.resolve_lookups(path).ok_or_else(|| {
                RenderError::variable_does_not_exist(format!(
                    "Failed lookup for key [{}] in context",
                    self.source
                ))
            }),
        }
    }
}

impl FilterExpression {
    /// Resolve the operand and run the filters over it.
    ///
    /// With `ignore_failures`, a missing operand becomes [`Value::None`]
    /// and the filters still run. Without it, the missing-operand error is
    /// returned so the caller can substitute its own placeholder. Errors
    /// from filter arguments or filters are always returned.
    pub fn resolve(&self, ctx: &Context, ignore_failures: bool) -> Result<Value, RenderError> {
        let value = match self.var.resolve(ctx) {
            Ok(value) => value,
            Err(e) if e.is_missing_variable() && ignore_failures => Value::None,
            Err(e) => return Err(e),
        };
        self.apply_filters(ctx, value)
    }

    pub fn apply_filters(&self, ctx: &Context, mut value: Value) -> Result<Value, RenderError> {
        for call in &self.filters {
            let arg = call.arg.as_ref().map(|arg| arg.resolve(ctx)).transpose()?;
            value = call.filter.apply(value, arg)?;
        }
        Ok(value)
    }
}

/// Resolve a tag argument against the context.
///
/// Filter expressions are resolved with failures ignored; if the result is
/// absent the lookup is reported as `VariableDoesNotExist`, the same as a
/// missing plain variable. Tags treat that error as "skip this effect".
///
/// ```rust
/// use request_tags::{resolve_value, Argument, Context, Variable, Value};
///
/// let ctx: Context = [("foo", "bar")].into_iter().collect();
/// let found = resolve_value(&Argument::Variable(Variable::lookup("foo")), &ctx).unwrap();
/// assert_eq!(found, Value::from("bar"));
///
/// let missing = resolve_value(&Argument::Variable(Variable::lookup("nope")), &ctx);
/// assert!(missing.unwrap_err().is_missing_variable());
/// ```
pub fn resolve_value(argument: &Argument, ctx: &Context) -> Result<Value, RenderError> {
    match argument {
        Argument::Literal(value) => Ok(value.clone()),
        Argument::Variable(var) => var.resolve(ctx),
        Argument::Expression(expr) => {
            let value = expr.resolve(ctx, true)?;
            if value.is_none() {
                Err(RenderError::failed_lookup(&expr.source))
            } else {
                Ok(value)
            }
        }
    }
}
