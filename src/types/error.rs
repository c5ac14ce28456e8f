use thiserror::Error;

/// Errors produced while building symbol tables, parsing match expressions,
/// or compiling them to flow matches.
///
/// Every variant is recoverable: the engine never panics on bad input, and a
/// failed stage drops any partially built tree before returning.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExprError {
    #[error("syntax error: {message}")]
    Syntax { message: String },

    #[error("lexical error: {message}")]
    Lexical { message: String },

    #[error("'{symbol}' is not a defined field, subfield, or predicate")]
    UndefinedSymbol { symbol: String },

    #[error("{message}")]
    LevelOfMeasurement { symbol: String, message: String },

    #[error("{message}")]
    WidthMismatch { symbol: String, message: String },

    #[error("circular definition involving symbol '{symbol}'")]
    CircularPrerequisite { symbol: String },

    #[error("no logical port named '{port}'")]
    UnresolvedPort { port: String },

    #[error("duplicate symbol name '{name}'")]
    DuplicateSymbol { name: String },

    #[error("expression expands to {terminals} terminals, more than the limit of {limit}")]
    TooComplex { terminals: usize, limit: usize },
}

impl ExprError {
    pub(crate) fn syntax(message: impl Into<String>) -> Self {
        ExprError::Syntax {
            message: message.into(),
        }
    }

    pub(crate) fn lexical(message: impl Into<String>) -> Self {
        ExprError::Lexical {
            message: message.into(),
        }
    }

    pub(crate) fn undefined(symbol: impl Into<String>) -> Self {
        ExprError::UndefinedSymbol {
            symbol: symbol.into(),
        }
    }

    pub(crate) fn level(symbol: impl Into<String>, message: impl Into<String>) -> Self {
        ExprError::LevelOfMeasurement {
            symbol: symbol.into(),
            message: message.into(),
        }
    }

    pub(crate) fn width(symbol: impl Into<String>, message: impl Into<String>) -> Self {
        ExprError::WidthMismatch {
            symbol: symbol.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undefined_symbol_message() {
        let err = ExprError::undefined("vlan.pcp");
        assert_eq!(
            err.to_string(),
            "'vlan.pcp' is not a defined field, subfield, or predicate"
        );
    }

    #[test]
    fn circular_prerequisite_message() {
        let err = ExprError::CircularPrerequisite {
            symbol: "p1".into(),
        };
        assert_eq!(err.to_string(), "circular definition involving symbol 'p1'");
    }

    #[test]
    fn unresolved_port_message() {
        let err = ExprError::UnresolvedPort {
            port: "lp-missing".into(),
        };
        assert_eq!(err.to_string(), "no logical port named 'lp-missing'");
    }

    #[test]
    fn duplicate_symbol_message() {
        let err = ExprError::DuplicateSymbol {
            name: "eth.type".into(),
        };
        assert_eq!(err.to_string(), "duplicate symbol name 'eth.type'");
    }

    #[test]
    fn too_complex_message() {
        let err = ExprError::TooComplex {
            terminals: 4096,
            limit: 1024,
        };
        assert_eq!(
            err.to_string(),
            "expression expands to 4096 terminals, more than the limit of 1024"
        );
    }
}
