use sqlx::PgPool;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::org::{BoardRow, SalespersonRow, UnitRow};
use crate::middleware::auth::AuthActor;
use crate::org::{Reach, Visibility};
use crate::query::SellerSet;

/// The scoping predicate a role's visibility reduces to. Derived purely
/// from the actor; both the list path (via materialized seller ids) and
/// the detail path (via direct id constraints) consume the same plan, so
/// the role-to-scope decision exists in exactly one place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopePlan {
    Everything,
    Board { board_id: Uuid },
    Unit { board_id: Uuid, unit_id: Uuid },
    SelfOnly { board_id: Uuid, unit_id: Uuid, user_id: Uuid },
}

impl ScopePlan {
    /// Derive the plan from the actor's role visibility table. `None` when
    /// the role is unrecognized or the claims lack the assignment the role
    /// requires; the caller decides whether that is an authorization
    /// failure or just an empty scope.
    pub fn for_actor(actor: &AuthActor) -> Option<ScopePlan> {
        let visibility = actor.role()?.visibility();
        Self::from_visibility(visibility, actor)
    }

    fn from_visibility(visibility: Visibility, actor: &AuthActor) -> Option<ScopePlan> {
        match visibility {
            Visibility { boards: Reach::All, .. } => Some(ScopePlan::Everything),
            Visibility { units: Reach::Assigned, .. } => {
                Some(ScopePlan::Board { board_id: actor.board_id? })
            }
            Visibility { salespeople: Reach::Assigned, .. } => Some(ScopePlan::Unit {
                board_id: actor.board_id?,
                unit_id: actor.unit_id?,
            }),
            Visibility { salespeople: Reach::Own, .. } => Some(ScopePlan::SelfOnly {
                board_id: actor.board_id?,
                unit_id: actor.unit_id?,
                user_id: actor.id,
            }),
            _ => None,
        }
    }
}

/// The materialized universe visible to an actor: the menus the list
/// endpoint returns and the seller ids that bound its query.
#[derive(Debug, Clone, Default)]
pub struct ResolvedScope {
    pub boards: Vec<BoardRow>,
    pub units: Vec<UnitRow>,
    pub salespeople: Vec<SalespersonRow>,
}

impl ResolvedScope {
    /// An empty scope still executes downstream queries (returning zero
    /// rows); it is never conflated with "no filter".
    pub fn empty() -> Self {
        Self::default()
    }

    /// Seller restriction for the list query. Only a full-universe plan is
    /// unrestricted; every narrower plan pins the seller ids, even when
    /// the set is empty.
    pub fn seller_set(&self, plan: Option<&ScopePlan>) -> SellerSet {
        match plan {
            Some(ScopePlan::Everything) => SellerSet::Unrestricted,
            _ => SellerSet::Only(self.salespeople.iter().map(|s| s.id).collect()),
        }
    }
}

/// Materializes scope plans against the org reference data.
#[derive(Clone)]
pub struct ScopeResolver {
    pool: PgPool,
}

impl ScopeResolver {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn resolve(&self, plan: &ScopePlan) -> Result<ResolvedScope, DatabaseError> {
        let scope = match plan {
            ScopePlan::Everything => ResolvedScope {
                boards: sqlx::query_as::<_, BoardRow>("SELECT id, board_name FROM boards")
                    .fetch_all(&self.pool)
                    .await?,
                units: self.all_units().await?,
                salespeople: sqlx::query_as::<_, SalespersonRow>("SELECT id, name FROM users")
                    .fetch_all(&self.pool)
                    .await?,
            },
            ScopePlan::Board { board_id } => ResolvedScope {
                boards: self.board(*board_id).await?,
                units: sqlx::query_as::<_, UnitRow>(
                    "SELECT id, unit_name, board_id, latitude, longitude FROM units \
                     WHERE board_id = $1",
                )
                .bind(board_id)
                .fetch_all(&self.pool)
                .await?,
                salespeople: sqlx::query_as::<_, SalespersonRow>(
                    "SELECT users.id, users.name FROM users \
                     JOIN unit_assignments ON unit_assignments.user_id = users.id \
                     WHERE unit_assignments.board_id = $1",
                )
                .bind(board_id)
                .fetch_all(&self.pool)
                .await?,
            },
            ScopePlan::Unit { board_id, unit_id } => ResolvedScope {
                boards: self.board(*board_id).await?,
                units: self.unit(*unit_id).await?,
                salespeople: sqlx::query_as::<_, SalespersonRow>(
                    "SELECT users.id, users.name FROM users \
                     JOIN unit_assignments ON unit_assignments.user_id = users.id \
                     WHERE unit_assignments.unit_id = $1",
                )
                .bind(unit_id)
                .fetch_all(&self.pool)
                .await?,
            },
            ScopePlan::SelfOnly { board_id, unit_id, user_id } => ResolvedScope {
                boards: self.board(*board_id).await?,
                units: self.unit(*unit_id).await?,
                salespeople: sqlx::query_as::<_, SalespersonRow>(
                    "SELECT id, name FROM users WHERE id = $1",
                )
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?,
            },
        };

        Ok(scope)
    }

    /// Every unit with its registered coordinate, also the candidate set
    /// for roaming detection.
    pub async fn all_units(&self) -> Result<Vec<UnitRow>, DatabaseError> {
        Ok(sqlx::query_as::<_, UnitRow>(
            "SELECT id, unit_name, board_id, latitude, longitude FROM units",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn board(&self, board_id: Uuid) -> Result<Vec<BoardRow>, DatabaseError> {
        Ok(sqlx::query_as::<_, BoardRow>("SELECT id, board_name FROM boards WHERE id = $1")
            .bind(board_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn unit(&self, unit_id: Uuid) -> Result<Vec<UnitRow>, DatabaseError> {
        Ok(sqlx::query_as::<_, UnitRow>(
            "SELECT id, unit_name, board_id, latitude, longitude FROM units WHERE id = $1",
        )
        .bind(unit_id)
        .fetch_all(&self.pool)
        .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(role: &str, board: Option<Uuid>, unit: Option<Uuid>) -> AuthActor {
        AuthActor {
            id: Uuid::new_v4(),
            name: "Test".to_string(),
            role: role.to_string(),
            board_id: board,
            unit_id: unit,
        }
    }

    #[test]
    fn general_manager_plans_everything_without_assignment() {
        let plan = ScopePlan::for_actor(&actor("general_manager", None, None));
        assert_eq!(plan, Some(ScopePlan::Everything));
    }

    #[test]
    fn director_plans_board_scope() {
        let board = Uuid::new_v4();
        let plan = ScopePlan::for_actor(&actor("director", Some(board), None));
        assert_eq!(plan, Some(ScopePlan::Board { board_id: board }));
    }

    #[test]
    fn manager_plans_unit_scope() {
        let board = Uuid::new_v4();
        let unit = Uuid::new_v4();
        let plan = ScopePlan::for_actor(&actor("manager", Some(board), Some(unit)));
        assert_eq!(plan, Some(ScopePlan::Unit { board_id: board, unit_id: unit }));
    }

    #[test]
    fn salesperson_plans_self_only() {
        let board = Uuid::new_v4();
        let unit = Uuid::new_v4();
        let a = actor("salesperson", Some(board), Some(unit));
        let plan = ScopePlan::for_actor(&a);
        assert_eq!(
            plan,
            Some(ScopePlan::SelfOnly { board_id: board, unit_id: unit, user_id: a.id })
        );
    }

    #[test]
    fn unrecognized_role_has_no_plan() {
        assert_eq!(ScopePlan::for_actor(&actor("auditor", None, None)), None);
    }

    #[test]
    fn missing_required_assignment_has_no_plan() {
        assert_eq!(ScopePlan::for_actor(&actor("director", None, None)), None);
        assert_eq!(ScopePlan::for_actor(&actor("manager", Some(Uuid::new_v4()), None)), None);
        assert_eq!(ScopePlan::for_actor(&actor("salesperson", None, None)), None);
    }

    #[test]
    fn only_the_full_universe_is_unrestricted() {
        let scope = ResolvedScope::empty();
        assert_eq!(scope.seller_set(Some(&ScopePlan::Everything)), SellerSet::Unrestricted);

        let board_plan = ScopePlan::Board { board_id: Uuid::new_v4() };
        assert_eq!(scope.seller_set(Some(&board_plan)), SellerSet::Only(vec![]));
        assert_eq!(scope.seller_set(None), SellerSet::Only(vec![]));
    }
}
