use core::fmt;

use smallvec::SmallVec;
use thiserror::Error;

/// Maximum number of steps a [`MemberPath`] may hold.
pub const MAX_PATH_DEPTH: usize = 16;

/// A single step of a [`MemberPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathStep {
    /// Class member, by name.
    Name(Box<str>),
    /// Array element, by index.
    Index(u32),
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum PathError {
    #[error("member path exceeds maximum depth of {MAX_PATH_DEPTH}")]
    TooDeep,
}

// -----------------------------------------------------------------------------
// MemberPath

/// Location of a leaf member inside a nested object, as a bounded sequence
/// of name and index steps.
///
/// The depth cap keeps paths cheap to copy around and puts a hard bound on
/// recursive addressing. Pushing past [`MAX_PATH_DEPTH`] fails.
///
/// # Examples
///
/// ```
/// use vc_rtti::reflect::MemberPath;
///
/// let mut path = MemberPath::new();
/// path.push_name("targets")?;
/// path.push_index(3)?;
/// path.push_name("x")?;
/// assert_eq!(path.to_string(), "targets[3].x");
/// # Ok::<(), vc_rtti::reflect::PathError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Hash)]
pub struct MemberPath {
    steps: SmallVec<[PathStep; 8]>,
}

impl MemberPath {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-step path addressing a direct member.
    pub fn from_name(name: &str) -> Self {
        let mut steps = SmallVec::new();
        steps.push(PathStep::Name(name.into()));
        Self { steps }
    }

    pub fn push_name(&mut self, name: &str) -> Result<(), PathError> {
        self.push(PathStep::Name(name.into()))
    }

    pub fn push_index(&mut self, index: u32) -> Result<(), PathError> {
        self.push(PathStep::Index(index))
    }

    pub fn push(&mut self, step: PathStep) -> Result<(), PathError> {
        if self.steps.len() >= MAX_PATH_DEPTH {
            return Err(PathError::TooDeep);
        }
        self.steps.push(step);
        Ok(())
    }

    pub fn pop(&mut self) -> Option<PathStep> {
        self.steps.pop()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }
}

impl fmt::Display for MemberPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            match step {
                PathStep::Name(name) if i == 0 => write!(f, "{name}")?,
                PathStep::Name(name) => write!(f, ".{name}")?,
                PathStep::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats_steps() {
        let mut path = MemberPath::from_name("a");
        path.push_index(2).unwrap();
        path.push_name("b").unwrap();
        assert_eq!(path.to_string(), "a[2].b");
    }

    #[test]
    fn depth_is_bounded() {
        let mut path = MemberPath::new();
        for i in 0..MAX_PATH_DEPTH {
            path.push_index(i as u32).unwrap();
        }
        assert_eq!(path.push_name("overflow"), Err(PathError::TooDeep));
        assert_eq!(path.len(), MAX_PATH_DEPTH);

        // Popping frees room again.
        path.pop();
        assert!(path.push_name("ok").is_ok());
    }

    #[test]
    fn equality_by_steps() {
        assert_eq!(MemberPath::from_name("b"), {
            let mut p = MemberPath::new();
            p.push_name("b").unwrap();
            p
        });
        assert_ne!(MemberPath::from_name("b"), MemberPath::from_name("c"));
    }
}
