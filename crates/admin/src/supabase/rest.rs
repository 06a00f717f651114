//! `PostgREST` record access.
//!
//! Queries are expressed with [`Query`] and [`Filter`], which render to the
//! `PostgREST` query-string grammar (`col=eq.value`, `or=(and(...),and(...))`,
//! `order=col.asc`).

use reqwest::Method;
use serde::{Serialize, de::DeserializeOwned};
use tracing::instrument;

use super::{Credential, SupabaseClient, SupabaseError};

/// Sort direction for an ordering clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Ascending => "asc",
            Self::Descending => "desc",
        }
    }
}

/// A column filter expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// `column = value`
    Eq(String, String),
    /// All inner filters must match.
    And(Vec<Filter>),
    /// Any inner filter may match.
    Or(Vec<Filter>),
}

impl Filter {
    /// `column = value`
    #[must_use]
    pub fn eq(column: &str, value: impl ToString) -> Self {
        Self::Eq(column.to_string(), value.to_string())
    }

    /// Match rows where `(a_col, b_col)` is `(x, y)` or `(y, x)`.
    #[must_use]
    pub fn either_direction(a_col: &str, b_col: &str, x: impl ToString, y: impl ToString) -> Self {
        let (x, y) = (x.to_string(), y.to_string());
        Self::Or(vec![
            Self::And(vec![Self::eq(a_col, &x), Self::eq(b_col, &y)]),
            Self::And(vec![Self::eq(a_col, &y), Self::eq(b_col, &x)]),
        ])
    }

    /// Render as a top-level query parameter.
    fn to_param(&self) -> (String, String) {
        match self {
            Self::Eq(column, value) => (column.clone(), format!("eq.{value}")),
            Self::And(inner) => ("and".to_string(), format!("({})", render_list(inner))),
            Self::Or(inner) => ("or".to_string(), format!("({})", render_list(inner))),
        }
    }

    /// Render nested inside a logical group.
    fn render(&self) -> String {
        match self {
            Self::Eq(column, value) => format!("{column}.eq.{value}"),
            Self::And(inner) => format!("and({})", render_list(inner)),
            Self::Or(inner) => format!("or({})", render_list(inner)),
        }
    }
}

fn render_list(filters: &[Filter]) -> String {
    filters
        .iter()
        .map(Filter::render)
        .collect::<Vec<_>>()
        .join(",")
}

/// A `select=*` query with optional filters and ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    filters: Vec<Filter>,
    order: Option<(String, Direction)>,
}

impl Query {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    #[must_use]
    pub fn order(mut self, column: &str, direction: Direction) -> Self {
        self.order = Some((column.to_string(), direction));
        self
    }

    /// Query-string pairs, in a stable order.
    #[must_use]
    pub fn params(&self) -> Vec<(String, String)> {
        let mut params = vec![("select".to_string(), "*".to_string())];
        params.extend(self.filters.iter().map(Filter::to_param));
        if let Some((column, direction)) = &self.order {
            params.push(("order".to_string(), format!("{column}.{}", direction.as_str())));
        }
        params
    }
}

impl SupabaseClient {
    /// Select rows from a table.
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError` if the request fails or the rows cannot be parsed.
    #[instrument(skip(self, query))]
    pub async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &Query,
    ) -> Result<Vec<T>, SupabaseError> {
        let url = self.url_with_params(&format!("/rest/v1/{table}"), &query.params())?;
        let request = self.request(Method::GET, url, Credential::Anon)?;
        self.send_json(request).await
    }

    /// Insert one row.
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError` if the remote service rejects the write.
    #[instrument(skip(self, row))]
    pub async fn insert<B: Serialize + Sync>(&self, table: &str, row: &B) -> Result<(), SupabaseError> {
        let request = self
            .request(Method::POST, self.url(&format!("/rest/v1/{table}")), Credential::Anon)?
            .header("Prefer", "return=minimal")
            .json(&[row]);
        self.send(request).await?;
        Ok(())
    }

    /// Update the rows matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError` if the remote service rejects the write.
    #[instrument(skip(self, changes))]
    pub async fn update<B: Serialize + Sync>(
        &self,
        table: &str,
        filter: &Filter,
        changes: &B,
    ) -> Result<(), SupabaseError> {
        let url = self.url_with_params(&format!("/rest/v1/{table}"), &[filter.to_param()])?;
        let request = self
            .request(Method::PATCH, url, Credential::Anon)?
            .header("Prefer", "return=minimal")
            .json(changes);
        self.send(request).await?;
        Ok(())
    }

    /// Delete the rows matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError` if the remote service rejects the delete.
    #[instrument(skip(self))]
    pub async fn delete(&self, table: &str, filter: &Filter) -> Result<(), SupabaseError> {
        let url = self.url_with_params(&format!("/rest/v1/{table}"), &[filter.to_param()])?;
        let request = self
            .request(Method::DELETE, url, Credential::Anon)?
            .header("Prefer", "return=minimal");
        self.send(request).await?;
        Ok(())
    }

    /// Call a remote procedure with no arguments.
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError` if the call fails or the result cannot be parsed.
    #[instrument(skip(self))]
    pub async fn rpc<T: DeserializeOwned>(&self, function: &str) -> Result<T, SupabaseError> {
        let request = self
            .request(
                Method::POST,
                self.url(&format!("/rest/v1/rpc/{function}")),
                Credential::Anon,
            )?
            .json(&serde_json::json!({}));
        self.send_json(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_all_without_filters() {
        let params = Query::new().params();
        assert_eq!(params, vec![("select".to_string(), "*".to_string())]);
    }

    #[test]
    fn test_order_descending() {
        let params = Query::new()
            .order("created_at", Direction::Descending)
            .params();
        assert_eq!(
            params.last(),
            Some(&("order".to_string(), "created_at.desc".to_string()))
        );
    }

    #[test]
    fn test_eq_filter_param() {
        assert_eq!(
            Filter::eq("id", 42).to_param(),
            ("id".to_string(), "eq.42".to_string())
        );
    }

    #[test]
    fn test_either_direction_renders_and_groups() {
        let filter = Filter::either_direction("sender_id", "receiver_id", "u", "a");
        let (key, value) = filter.to_param();

        assert_eq!(key, "or");
        assert_eq!(
            value,
            "(and(sender_id.eq.u,receiver_id.eq.a),and(sender_id.eq.a,receiver_id.eq.u))"
        );
    }

    #[test]
    fn test_full_conversation_query() {
        let params = Query::new()
            .filter(Filter::either_direction("sender_id", "receiver_id", "u", "a"))
            .order("created_at", Direction::Ascending)
            .params();

        let keys: Vec<&str> = params.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["select", "or", "order"]);
    }
}
