#![forbid(unsafe_code)]

use std::rc::Rc;

use quill_ir::{Context, FunctionSig, IrError, Kind, SVal};
use tracing::debug;

use crate::{Emitted, FunctionDecl, LowerError, Purpose, ValidTrace, Wrapper};

fn pipeline<F>(
    parent: &Context,
    purpose: Purpose,
    context: &str,
    expected: &Kind,
    computation: F,
) -> Result<ValidTrace, LowerError>
where
    F: FnOnce(&mut Context) -> Result<SVal, IrError>,
{
    let child = crate::fork(parent, purpose)?;
    let trace = crate::replay(child, context, computation)?;
    crate::validate(context, trace, expected)
}

fn text(emitted: Emitted, context: &str) -> Result<String, LowerError> {
    match emitted {
        Emitted::Text(s) => Ok(s),
        Emitted::Function(f) => Err(LowerError::impossible(
            context,
            format!("expected text, got a declaration of {}", f.name),
        )),
    }
}

/// Lower `computation` into an anonymous `(lambda ...)` over its inputs.
pub fn lower_lambda<F>(parent: &Context, expected: &Kind, computation: F) -> Result<String, LowerError>
where
    F: FnOnce(&mut Context) -> Result<SVal, IrError>,
{
    let context = Purpose::Lambda.describe();
    let valid = pipeline(parent, Purpose::Lambda, context, expected, computation)?;
    text(crate::serialize(&valid, &Wrapper::Lambda), context)
}

/// Lower `computation` into a named definition and register it in `parent`.
///
/// The body may call `name` itself, which makes the definition recursive.
/// A name can be defined once per session.
pub fn lower_function<F>(
    parent: &Context,
    name: &str,
    expected: &Kind,
    computation: F,
) -> Result<Rc<FunctionDecl>, LowerError>
where
    F: FnOnce(&mut Context) -> Result<SVal, IrError>,
{
    let context = format!("{} {name}", Purpose::Named.describe());
    if let Some(sig) = parent.user_function(name) {
        return Err(LowerError::unsupported(
            &context,
            format!("redefining {name}, already defined as ({sig})"),
        ));
    }
    let declared_before = parent.uninterpreted(name).is_some();
    let result = define(parent, name, expected, &context, computation);
    if result.is_err() && !declared_before {
        // A self-call in a rejected body must not leave its signature behind.
        parent.forget_uninterpreted(name);
    }
    result
}

fn define<F>(
    parent: &Context,
    name: &str,
    expected: &Kind,
    context: &str,
    computation: F,
) -> Result<Rc<FunctionDecl>, LowerError>
where
    F: FnOnce(&mut Context) -> Result<SVal, IrError>,
{
    let valid = pipeline(parent, Purpose::Named, context, expected, computation)?;
    let sig = FunctionSig {
        args: valid.params.iter().map(|(_, k)| k.clone()).collect(),
        result: expected.clone(),
    };
    if let Some(used) = parent.uninterpreted(name) {
        if used != sig {
            return Err(LowerError::unsupported(
                context,
                format!("a body calling itself as ({used}) while defined as ({sig})"),
            ));
        }
    }
    let decl = match crate::serialize(&valid, &Wrapper::Named(name.to_string())) {
        Emitted::Function(f) => Rc::new(f),
        Emitted::Text(_) => {
            return Err(LowerError::impossible(context, "expected a declaration, got text"));
        }
    };
    debug!(name, recursive = decl.recursive, "registering definition");
    parent.register_definition(sig, decl.clone());
    Ok(decl)
}

/// Lower a boolean `computation` into a universally quantified assertion,
/// record it as an axiom of `parent`, and return its text.
///
/// Only allowed at the outermost scope.
pub fn lower_constraint<F>(parent: &Context, label: &str, computation: F) -> Result<String, LowerError>
where
    F: FnOnce(&mut Context) -> Result<SVal, IrError>,
{
    let context = format!("{} {label}", Purpose::Constraint.describe());
    let valid = pipeline(parent, Purpose::Constraint, &context, &Kind::Bool, computation)?;
    let out = text(
        crate::serialize(&valid, &Wrapper::Constraint(label.to_string())),
        &context,
    )?;
    parent.add_axiom(out.clone());
    Ok(out)
}
