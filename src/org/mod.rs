use serde::{Deserialize, Serialize};

/// Organizational roles, ordered lowest to highest authority so that
/// `Ord` matches rank (`Salesperson < Manager < Director < GeneralManager`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Salesperson,
    Manager,
    Director,
    GeneralManager,
}

/// How much of each organizational axis a role may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Reach {
    /// Only the actor's own node on this axis.
    Own,
    /// Every node under the actor's assigned parent.
    Assigned,
    /// The full universe.
    All,
}

/// Visibility breadth per axis. All role-based branching in the crate
/// flows through this table; nothing else switches on `Role` directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Visibility {
    pub boards: Reach,
    pub units: Reach,
    pub salespeople: Reach,
}

impl Role {
    /// Parse the role string carried in a token. Unknown strings yield
    /// `None`; the caller decides whether that is an authorization failure.
    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "general_manager" => Some(Role::GeneralManager),
            "director" => Some(Role::Director),
            "manager" => Some(Role::Manager),
            "salesperson" => Some(Role::Salesperson),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::GeneralManager => "general_manager",
            Role::Director => "director",
            Role::Manager => "manager",
            Role::Salesperson => "salesperson",
        }
    }

    /// Role-to-scope table. Invariant: every axis narrows monotonically
    /// as rank decreases (checked by `visibility_narrows_with_rank`).
    pub fn visibility(&self) -> Visibility {
        match self {
            Role::GeneralManager => Visibility {
                boards: Reach::All,
                units: Reach::All,
                salespeople: Reach::All,
            },
            Role::Director => Visibility {
                boards: Reach::Own,
                units: Reach::Assigned,
                salespeople: Reach::Assigned,
            },
            Role::Manager => Visibility {
                boards: Reach::Own,
                units: Reach::Own,
                salespeople: Reach::Assigned,
            },
            Role::Salesperson => Visibility {
                boards: Reach::Own,
                units: Reach::Own,
                salespeople: Reach::Own,
            },
        }
    }

    /// Whether this role needs a board assignment to be well-formed.
    pub fn requires_board(&self) -> bool {
        !matches!(self, Role::GeneralManager)
    }

    /// Whether this role needs a unit assignment to be well-formed.
    pub fn requires_unit(&self) -> bool {
        matches!(self, Role::Manager | Role::Salesperson)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_roles() {
        assert_eq!(Role::parse("general_manager"), Some(Role::GeneralManager));
        assert_eq!(Role::parse("salesperson"), Some(Role::Salesperson));
        assert_eq!(Role::parse("intern"), None);
        assert_eq!(Role::parse(""), None);
    }

    #[test]
    fn role_strings_round_trip() {
        for role in [Role::GeneralManager, Role::Director, Role::Manager, Role::Salesperson] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
    }

    #[test]
    fn rank_ordering() {
        assert!(Role::Salesperson < Role::Manager);
        assert!(Role::Manager < Role::Director);
        assert!(Role::Director < Role::GeneralManager);
    }

    #[test]
    fn visibility_narrows_with_rank() {
        let ranked = [Role::Salesperson, Role::Manager, Role::Director, Role::GeneralManager];
        for pair in ranked.windows(2) {
            let (lower, higher) = (pair[0].visibility(), pair[1].visibility());
            assert!(lower.boards <= higher.boards);
            assert!(lower.units <= higher.units);
            assert!(lower.salespeople <= higher.salespeople);
        }
    }

    #[test]
    fn general_manager_sees_everything() {
        let v = Role::GeneralManager.visibility();
        assert_eq!(v.boards, Reach::All);
        assert_eq!(v.units, Reach::All);
        assert_eq!(v.salespeople, Reach::All);
    }

    #[test]
    fn assignment_requirements() {
        assert!(!Role::GeneralManager.requires_board());
        assert!(Role::Director.requires_board());
        assert!(!Role::Director.requires_unit());
        assert!(Role::Salesperson.requires_unit());
    }
}
