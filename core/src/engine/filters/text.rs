//! Built-in text filters

use super::{FilterStage, StageOutput};
use crate::engine::errors::RenderError;
use crate::engine::types::Literal;

/// `uppercase` - upper-cases every chunk as it arrives
#[derive(Debug, Default)]
pub struct Uppercase;

impl FilterStage for Uppercase {
    fn accept(&mut self, chunk: &str, out: &mut StageOutput) {
        out.push(chunk.to_uppercase());
    }
}

/// `wrap(prefix, suffix)` - surrounds the forwarded input
///
/// The prefix goes out exactly once, before the first forwarded chunk (or at
/// finish when no input ever arrived). The suffix follows all input.
#[derive(Debug)]
pub struct Wrap {
    prefix: String,
    suffix: String,
    started: bool,
}

impl Wrap {
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
            started: false,
        }
    }

    pub fn from_args(args: &[Literal]) -> Result<Self, RenderError> {
        match args {
            [prefix, suffix] => Ok(Self::new(text_arg(prefix)?, text_arg(suffix)?)),
            _ => Err(RenderError::InvalidFilterArgs {
                filter: "wrap".to_string(),
                reason: format!("expected (prefix, suffix), got {} argument(s)", args.len()),
            }),
        }
    }

    fn start(&mut self, out: &mut StageOutput) {
        if !self.started {
            self.started = true;
            out.push(self.prefix.clone());
        }
    }
}

impl FilterStage for Wrap {
    fn accept(&mut self, chunk: &str, out: &mut StageOutput) {
        self.start(out);
        out.push(chunk);
    }

    fn finish(&mut self, out: &mut StageOutput) {
        self.start(out);
        out.push(self.suffix.clone());
        out.end();
    }
}

fn text_arg(arg: &Literal) -> Result<String, RenderError> {
    match arg {
        Literal::Str(_) | Literal::Num(_) => Ok(arg.to_string()),
        Literal::Bool(_) => Err(RenderError::InvalidFilterArgs {
            filter: "wrap".to_string(),
            reason: "prefix and suffix must be text".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uppercase_has_no_boundary_output() {
        let mut stage = Uppercase;
        let mut out = StageOutput::default();
        stage.accept("test page", &mut out);
        stage.finish(&mut out);
        assert_eq!(out.chunks, vec!["TEST PAGE"]);
        assert!(out.is_ended());
    }

    #[test]
    fn test_wrap_prefix_once() {
        let mut stage = Wrap::new("<", ">");
        let mut out = StageOutput::default();
        stage.accept("a", &mut out);
        stage.accept("b", &mut out);
        stage.finish(&mut out);
        assert_eq!(out.chunks, vec!["<", "a", "b", ">"]);
    }

    #[test]
    fn test_wrap_without_input() {
        let mut stage = Wrap::new("<", ">");
        let mut out = StageOutput::default();
        stage.finish(&mut out);
        assert_eq!(out.chunks, vec!["<", ">"]);
        assert!(out.is_ended());
    }

    #[test]
    fn test_wrap_argument_validation() {
        let err = Wrap::from_args(&[Literal::from("only")]).unwrap_err();
        assert!(matches!(err, RenderError::InvalidFilterArgs { .. }));

        let err = Wrap::from_args(&[Literal::from(true), Literal::from("x")]).unwrap_err();
        assert!(err.to_string().contains("must be text"));

        let wrap = Wrap::from_args(&[Literal::Num(1.0), Literal::from("]")]).unwrap();
        assert_eq!(wrap.prefix, "1");
    }
}
