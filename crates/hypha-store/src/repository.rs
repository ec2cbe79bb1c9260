//! Queries joining on-chain identity with relational rows
//!
//! Addresses are compared upper-cased on both sides so checksum, lower and
//! upper case spellings of one address hit the same row.

use crate::entity::{documents, people, spaces};
use crate::error::{Result, StoreError};
use crate::pagination::{OffsetPage, OffsetRequest, PageRequest, Paginated};
use sea_orm::sea_query::{Expr, Func, SimpleExpr};
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect,
};
use std::collections::HashSet;
use tracing::debug;

const MAX_ORGANISATION_DEPTH: usize = 16;

/// Proposal documents carry this state
pub const PROPOSAL_STATE: &str = "proposal";

fn upper_eq<C: ColumnTrait>(column: C, address: &str) -> SimpleExpr {
    Expr::expr(Func::upper(Expr::col(column))).eq(address.to_uppercase())
}

fn upper_in<C: ColumnTrait>(column: C, addresses: &[String]) -> SimpleExpr {
    let upper: Vec<String> = addresses.iter().map(|a| a.to_uppercase()).collect();
    Expr::expr(Func::upper(Expr::col(column))).is_in(upper)
}

fn search_condition<C: ColumnTrait>(columns: &[C], search: &str) -> Condition {
    let pattern = format!("%{}%", search.trim().to_lowercase());
    columns.iter().fold(Condition::any(), |cond, column| {
        cond.add(Expr::expr(Func::lower(Expr::col(*column))).like(pattern.clone()))
    })
}

fn non_empty(search: Option<&str>) -> Option<&str> {
    search.map(str::trim).filter(|s| !s.is_empty())
}

/// Read and reconciliation queries over one connection.
///
/// Pass a [`ScopedConnection`](crate::ScopedConnection) transaction for
/// caller-facing reads and the admin connection for reconciliation.
pub struct HybridRepository<'a, C> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> HybridRepository<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    pub async fn space_by_slug(&self, slug: &str) -> Result<spaces::Model> {
        spaces::Entity::find()
            .filter(spaces::Column::Slug.eq(slug))
            .one(self.conn)
            .await?
            .ok_or_else(|| StoreError::not_found("space", slug))
    }

    pub async fn space_by_web3_id(&self, web3_space_id: i64) -> Result<Option<spaces::Model>> {
        Ok(spaces::Entity::find()
            .filter(spaces::Column::Web3SpaceId.eq(web3_space_id))
            .one(self.conn)
            .await?)
    }

    pub async fn space_by_address(&self, address: &str) -> Result<Option<spaces::Model>> {
        Ok(spaces::Entity::find()
            .filter(upper_eq(spaces::Column::Address, address))
            .one(self.conn)
            .await?)
    }

    pub async fn person_by_address(&self, address: &str) -> Result<Option<people::Model>> {
        Ok(people::Entity::find()
            .filter(upper_eq(people::Column::Address, address))
            .one(self.conn)
            .await?)
    }

    /// Every person whose address is in `addresses`
    pub async fn people_by_addresses(&self, addresses: &[String]) -> Result<Vec<people::Model>> {
        if addresses.is_empty() {
            return Ok(Vec::new());
        }
        Ok(people::Entity::find()
            .filter(upper_in(people::Column::Address, addresses))
            .order_by_asc(people::Column::Id)
            .all(self.conn)
            .await?)
    }

    /// One page of the persons behind `addresses`, optionally filtered by name
    pub async fn search_people_by_addresses(
        &self,
        addresses: &[String],
        page: PageRequest,
        search: Option<&str>,
    ) -> Result<Paginated<people::Model>> {
        if addresses.is_empty() {
            return Ok(Paginated::empty(page));
        }
        let mut query = people::Entity::find().filter(upper_in(people::Column::Address, addresses));
        if let Some(search) = non_empty(search) {
            query = query.filter(search_condition(
                &[
                    people::Column::Name,
                    people::Column::Surname,
                    people::Column::Nickname,
                ],
                search,
            ));
        }

        let total = query.clone().count(self.conn).await?;
        let data = query
            .order_by_asc(people::Column::Id)
            .offset(page.offset())
            .limit(page.limit())
            .all(self.conn)
            .await?;
        debug!(
            "people page {} ({} of {} rows)",
            page.page,
            data.len(),
            total
        );
        Ok(Paginated::new(data, total, page))
    }

    /// One page of the spaces whose executor is in `addresses`
    pub async fn search_spaces_by_addresses(
        &self,
        addresses: &[String],
        page: PageRequest,
        search: Option<&str>,
    ) -> Result<Paginated<spaces::Model>> {
        if addresses.is_empty() {
            return Ok(Paginated::empty(page));
        }
        let mut query = spaces::Entity::find().filter(upper_in(spaces::Column::Address, addresses));
        if let Some(search) = non_empty(search) {
            query = query.filter(search_condition(
                &[spaces::Column::Title, spaces::Column::Slug],
                search,
            ));
        }

        let total = query.clone().count(self.conn).await?;
        let data = query
            .order_by_asc(spaces::Column::Id)
            .offset(page.offset())
            .limit(page.limit())
            .all(self.conn)
            .await?;
        Ok(Paginated::new(data, total, page))
    }

    pub async fn document_by_slug(&self, slug: &str) -> Result<documents::Model> {
        documents::Entity::find()
            .filter(documents::Column::Slug.eq(slug))
            .one(self.conn)
            .await?
            .ok_or_else(|| StoreError::not_found("document", slug))
    }

    /// Proposal documents of a space, newest first
    pub async fn space_proposals(
        &self,
        space_id: i32,
        request: OffsetRequest,
    ) -> Result<OffsetPage<documents::Model>> {
        let query = documents::Entity::find()
            .filter(documents::Column::SpaceId.eq(space_id))
            .filter(documents::Column::State.eq(PROPOSAL_STATE));

        let total = query.clone().count(self.conn).await?;
        let data = query
            .order_by_desc(documents::Column::CreatedAt)
            .order_by_desc(documents::Column::Id)
            .offset(request.offset)
            .limit(request.limit)
            .all(self.conn)
            .await?;
        Ok(OffsetPage::new(data, total, request))
    }

    /// Root of the space's organisation followed by all of its descendants
    pub async fn organisation(&self, space: spaces::Model) -> Result<Vec<spaces::Model>> {
        let mut root = space;
        let mut seen = HashSet::from([root.id]);
        for _ in 0..MAX_ORGANISATION_DEPTH {
            let Some(parent_id) = root.parent_id else {
                break;
            };
            if !seen.insert(parent_id) {
                break;
            }
            match spaces::Entity::find_by_id(parent_id).one(self.conn).await? {
                Some(parent) => root = parent,
                None => break,
            }
        }

        let mut seen = HashSet::from([root.id]);
        let mut frontier = vec![root.id];
        let mut organisation = vec![root];
        for _ in 0..MAX_ORGANISATION_DEPTH {
            if frontier.is_empty() {
                break;
            }
            let children = spaces::Entity::find()
                .filter(spaces::Column::ParentId.is_in(frontier))
                .order_by_asc(spaces::Column::Id)
                .all(self.conn)
                .await?;
            frontier = children
                .iter()
                .filter(|child| seen.insert(child.id))
                .map(|child| child.id)
                .collect();
            organisation.extend(children.into_iter().filter(|c| frontier.contains(&c.id)));
        }
        Ok(organisation)
    }

    /// Attach an on-chain space id to the pending row owned by `executor`.
    ///
    /// Returns the number of rows updated; rows that already carry an id are
    /// left untouched.
    pub async fn attach_web3_space_id(&self, executor: &str, web3_space_id: i64) -> Result<u64> {
        let result = spaces::Entity::update_many()
            .col_expr(spaces::Column::Web3SpaceId, Expr::value(web3_space_id))
            .filter(upper_eq(spaces::Column::Address, executor))
            .filter(spaces::Column::Web3SpaceId.is_null())
            .exec(self.conn)
            .await?;
        Ok(result.rows_affected)
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    #[tokio::test]
    async fn test_address_lookup_is_case_insensitive() {
        let stored = "0xAbCdEf0000000000000000000000000000000001";
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![person(1, "alice", stored)]])
            .append_query_results([vec![person(1, "alice", stored)]])
            .into_connection();
        let repo = HybridRepository::new(&db);

        let lower = repo.person_by_address(&stored.to_lowercase()).await.unwrap();
        let upper = repo.person_by_address(&stored.to_uppercase()).await.unwrap();
        assert_eq!(lower.map(|p| p.id), upper.map(|p| p.id));

        let log = format!("{:?}", db.into_transaction_log());
        assert!(log.contains("UPPER(\\\"address\\\")"));
        assert!(log.contains("0XABCDEF0000000000000000000000000000000001"));
        assert!(!log.contains("0xabcdef"));
    }

    #[tokio::test]
    async fn test_missing_slug_is_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<spaces::Model>::new()])
            .into_connection();
        let result = HybridRepository::new(&db).space_by_slug("nope").await;
        assert!(matches!(result, Err(StoreError::NotFound { entity: "space", .. })));
    }

    #[tokio::test]
    async fn test_people_pages() {
        let addresses: Vec<String> = (1..=3).map(|i| format!("0x{:040x}", i)).collect();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![count(3)]])
            .append_query_results([vec![
                person(1, "a", &addresses[0]),
                person(2, "b", &addresses[1]),
            ]])
            .append_query_results([vec![count(3)]])
            .append_query_results([vec![person(3, "c", &addresses[2])]])
            .into_connection();
        let repo = HybridRepository::new(&db);

        let first = repo
            .search_people_by_addresses(&addresses, PageRequest::new(Some(1), Some(2)).unwrap(), None)
            .await
            .unwrap();
        assert_eq!(first.data.len(), 2);
        assert!(first.pagination.has_next_page);

        let second = repo
            .search_people_by_addresses(&addresses, PageRequest::new(Some(2), Some(2)).unwrap(), None)
            .await
            .unwrap();
        assert_eq!(second.data.len(), 1);
        assert!(!second.pagination.has_next_page);
    }

    #[tokio::test]
    async fn test_empty_address_list_skips_query() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let page = HybridRepository::new(&db)
            .search_people_by_addresses(&[], PageRequest::new(None, None).unwrap(), Some("x"))
            .await
            .unwrap();
        assert!(page.data.is_empty());
        assert_eq!(page.pagination.total, 0);
        assert!(db.into_transaction_log().is_empty());
    }

    #[tokio::test]
    async fn test_search_lowercases_pattern() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![count(0)]])
            .append_query_results([Vec::<people::Model>::new()])
            .into_connection();
        HybridRepository::new(&db)
            .search_people_by_addresses(
                &["0xabc".to_string()],
                PageRequest::new(None, None).unwrap(),
                Some(" Ali "),
            )
            .await
            .unwrap();
        let log = format!("{:?}", db.into_transaction_log());
        assert!(log.contains("%ali%"));
        assert!(log.contains("LOWER(\\\"name\\\")"));
    }

    #[tokio::test]
    async fn test_attach_web3_space_id_only_pending_rows() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();
        let updated = HybridRepository::new(&db)
            .attach_web3_space_id("0xabc0000000000000000000000000000000000001", 42)
            .await
            .unwrap();
        assert_eq!(updated, 1);

        let log = format!("{:?}", db.into_transaction_log());
        assert!(log.contains("\\\"web3_space_id\\\" IS NULL"));
        assert!(log.contains("0XABC0000000000000000000000000000000000001"));
    }

    #[tokio::test]
    async fn test_organisation_walks_up_then_down() {
        let mut child = space(2, "child", "0x02", Some(2));
        child.parent_id = Some(1);
        let root = space(1, "root", "0x01", Some(1));
        let mut sibling = space(3, "sibling", "0x03", None);
        sibling.parent_id = Some(1);
        let mut grandchild = space(4, "grandchild", "0x04", None);
        grandchild.parent_id = Some(2);

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![root.clone()]])
            .append_query_results([vec![child.clone(), sibling.clone()]])
            .append_query_results([vec![grandchild.clone()]])
            .append_query_results([Vec::<spaces::Model>::new()])
            .into_connection();

        let organisation = HybridRepository::new(&db).organisation(child).await.unwrap();
        let slugs: Vec<&str> = organisation.iter().map(|s| s.slug.as_str()).collect();
        assert_eq!(slugs, vec!["root", "child", "sibling", "grandchild"]);
    }
}
