//! Output file staging and ownership

pub mod claim;
pub mod writer;

pub use claim::OutputClaim;
pub use writer::StagedOutput;

/// What to do when the target file already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverwritePolicy {
    /// Fail with `OutputExists`
    #[default]
    Never,
    /// Replace the existing file
    Always,
}

impl OverwritePolicy {
    pub fn from_flag(overwrite: bool) -> Self {
        if overwrite {
            OverwritePolicy::Always
        } else {
            OverwritePolicy::Never
        }
    }

    pub fn allows_overwrite(self) -> bool {
        self == OverwritePolicy::Always
    }
}
