#![forbid(unsafe_code)]

/// IEEE-754 rounding mode used when a floating-point constant is not exactly
/// representable in its target format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RoundingMode {
    #[default]
    RoundNearestTiesToEven,
    RoundNearestTiesToAway,
    RoundTowardPositive,
    RoundTowardNegative,
    RoundTowardZero,
}

impl RoundingMode {
    pub fn smt(self) -> &'static str {
        match self {
            RoundingMode::RoundNearestTiesToEven => "RNE",
            RoundingMode::RoundNearestTiesToAway => "RNA",
            RoundingMode::RoundTowardPositive => "RTP",
            RoundingMode::RoundTowardNegative => "RTN",
            RoundingMode::RoundTowardZero => "RTZ",
        }
    }
}

/// Session-wide solver configuration. Every forked context inherits a copy.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SmtConfig {
    pub rounding_mode: RoundingMode,
    /// Use `bvumul_noovfl` and friends for symbolic multiplication overflow
    /// instead of the bit-serial encoding. Concrete operands always take the
    /// bit-serial path.
    pub native_mul_overflow: bool,
    /// The session talks to the solver incrementally.
    pub incremental: bool,
    /// User-supplied `(set-option ...)` pairs, kept in order.
    pub options: Vec<(String, String)>,
}

impl SmtConfig {
    pub fn with_rounding_mode(mut self, rm: RoundingMode) -> Self {
        self.rounding_mode = rm;
        self
    }

    pub fn with_native_mul_overflow(mut self, on: bool) -> Self {
        self.native_mul_overflow = on;
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.push((key.into(), value.into()));
        self
    }

    pub fn set_option_lines(&self) -> Vec<String> {
        self.options
            .iter()
            .map(|(k, v)| format!("(set-option :{k} {v})"))
            .collect()
    }
}
