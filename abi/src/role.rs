//! Logical worker identities.

/// Number of roles a scenario can bind.
pub const ROLE_COUNT: usize = 3;

/// Identity of one scenario worker, bound to a concrete task at setup.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskRole {
    A = 0,
    B = 1,
    C = 2,
}

impl TaskRole {
    pub const ALL: [TaskRole; ROLE_COUNT] = [TaskRole::A, TaskRole::B, TaskRole::C];

    #[inline]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::A),
            1 => Some(Self::B),
            2 => Some(Self::C),
            _ => None,
        }
    }

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Task name handed to the scheduler. Stable and unique per role.
    #[inline]
    pub const fn label(self) -> &'static str {
        match self {
            Self::A => "TaskA",
            Self::B => "TaskB",
            Self::C => "TaskC",
        }
    }
}

impl core::fmt::Display for TaskRole {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}
