/// The two detection classes.
///
/// Integer encoding matches the training labels: 0 = Non-Tiger, 1 = Tiger.
///
/// # Example
/// ```
/// use rd_core::label::Label;
/// assert_eq!(Label::Tiger.index(), 1);
/// assert_eq!(Label::from_index(0), Some(Label::NonTiger));
/// assert_eq!(Label::Tiger.name(), "Tiger");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    /// Anything that is not a tiger roar.
    NonTiger = 0,
    /// A tiger roar.
    Tiger = 1,
}

impl Label {
    /// All classes, in index order.
    pub const ALL: [Self; 2] = [Self::NonTiger, Self::Tiger];

    /// Number of classes.
    pub const COUNT: usize = 2;

    /// Integer encoding used for training targets.
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Decode an integer class index.
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::NonTiger),
            1 => Some(Self::Tiger),
            _ => None,
        }
    }

    /// Human-readable class name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::NonTiger => "Non-Tiger",
            Self::Tiger => "Tiger",
        }
    }

    /// Class names in index order, as stored in the model artifact.
    #[must_use]
    pub fn names() -> Vec<String> {
        Self::ALL.iter().map(|l| l.name().to_string()).collect()
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
