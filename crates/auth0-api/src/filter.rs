//! Request parameter filters
//!
//! A filter accumulates `key -> value` entries for one endpoint family and
//! is merged into a request's query string. `Filter<K>` is a single
//! consuming builder; the kind marker `K` decides which setters exist, so a
//! checkpoint-paginated endpoint cannot be handed `with_page` by accident.
//!
//! Setters overwrite: calling one twice keeps the last value. Filters never
//! cross-validate entries (for instance `page` alongside `from`). Booleans and
//! integers are stored typed; the request layer decides the wire encoding.

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

pub const KEY_FIELDS: &str = "fields";
pub const KEY_INCLUDE_FIELDS: &str = "include_fields";
pub const KEY_PAGE: &str = "page";
pub const KEY_PER_PAGE: &str = "per_page";
pub const KEY_INCLUDE_TOTALS: &str = "include_totals";
pub const KEY_FROM: &str = "from";
pub const KEY_TAKE: &str = "take";
pub const KEY_QUERY: &str = "q";
pub const KEY_SORT: &str = "sort";

/// A typed query parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    Text(String),
    Int(i64),
    Bool(bool),
    /// Rendered comma-separated.
    List(Vec<String>),
    /// Already percent-encoded; appended to the URL verbatim.
    Encoded(String),
}

impl FilterValue {
    pub fn is_encoded(&self) -> bool {
        matches!(self, FilterValue::Encoded(_))
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::Text(s) | FilterValue::Encoded(s) => f.write_str(s),
            FilterValue::Int(n) => write!(f, "{n}"),
            FilterValue::Bool(b) => write!(f, "{b}"),
            FilterValue::List(items) => f.write_str(&items.join(",")),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Text(value.to_owned())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Text(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Int(value)
    }
}

impl From<i32> for FilterValue {
    fn from(value: i32) -> Self {
        FilterValue::Int(value.into())
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Bool(value)
    }
}

impl From<Vec<String>> for FilterValue {
    fn from(value: Vec<String>) -> Self {
        FilterValue::List(value)
    }
}

/// Anything that contributes query parameters to a request.
pub trait ParameterFilter {
    /// Owned snapshot of the accumulated parameters.
    fn as_map(&self) -> BTreeMap<String, FilterValue>;
}

/// Encode text the way HTML forms do: unreserved characters and `*` stay,
/// spaces become `+`, everything else becomes `%XX` of its UTF-8 bytes.
pub fn form_encode(value: &str) -> String {
    urlencoding::encode(value)
        .replace("%20", "+")
        .replace("%2A", "*")
        .replace('~', "%7E")
}

/// Filter kinds. Each marker opts into setter groups through the
/// capability traits below.
pub mod kind {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Fields {}
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Page {}
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Checkpoint {}
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Query {}
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum User {}
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Client {}
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum DeviceCredentials {}
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Rules {}
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum UsersImport {}
}

/// Kinds supporting `fields`/`include_fields`.
pub trait SelectsFields {}
/// Kinds supporting offset pagination (`page`/`per_page`).
pub trait PagesByOffset {}
/// Kinds supporting `include_totals`.
pub trait IncludesTotals {}
/// Kinds supporting checkpoint pagination (`from`/`take`).
pub trait PagesByCheckpoint {}
/// Kinds supporting a free-text query and sort.
pub trait Searches {}

impl SelectsFields for kind::Fields {}

impl SelectsFields for kind::Page {}
impl PagesByOffset for kind::Page {}
impl IncludesTotals for kind::Page {}
impl PagesByCheckpoint for kind::Page {}

impl SelectsFields for kind::Checkpoint {}
impl PagesByCheckpoint for kind::Checkpoint {}

impl SelectsFields for kind::Query {}
impl PagesByOffset for kind::Query {}
impl IncludesTotals for kind::Query {}
impl Searches for kind::Query {}

impl SelectsFields for kind::User {}
impl PagesByOffset for kind::User {}
impl IncludesTotals for kind::User {}
impl Searches for kind::User {}

impl SelectsFields for kind::Client {}
impl PagesByOffset for kind::Client {}
impl IncludesTotals for kind::Client {}

impl SelectsFields for kind::DeviceCredentials {}
impl PagesByOffset for kind::DeviceCredentials {}
impl IncludesTotals for kind::DeviceCredentials {}

impl SelectsFields for kind::Rules {}

/// Field selection only.
pub type FieldsFilter = Filter<kind::Fields>;
/// Offset or checkpoint pagination with totals.
pub type PageFilter = Filter<kind::Page>;
/// Checkpoint pagination only.
pub type CheckpointFilter = Filter<kind::Checkpoint>;
/// Free-text search with sorting and offset pagination.
pub type QueryFilter = Filter<kind::Query>;
/// User search; a query filter plus the search engine version.
pub type UserFilter = Filter<kind::User>;
pub type ClientFilter = Filter<kind::Client>;
pub type DeviceCredentialsFilter = Filter<kind::DeviceCredentials>;
pub type RulesFilter = Filter<kind::Rules>;
/// Options for a users import job, sent as multipart fields.
pub type UsersImportFilter = Filter<kind::UsersImport>;

/// Consuming parameter builder. Not meant to be shared across threads
/// while being built; build one per request.
pub struct Filter<K> {
    parameters: BTreeMap<String, FilterValue>,
    _kind: PhantomData<fn() -> K>,
}

impl<K> Filter<K> {
    pub fn new() -> Self {
        Self {
            parameters: BTreeMap::new(),
            _kind: PhantomData,
        }
    }

    fn put(mut self, key: &str, value: impl Into<FilterValue>) -> Self {
        self.parameters.insert(key.to_owned(), value.into());
        self
    }
}

impl<K> Default for Filter<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Clone for Filter<K> {
    fn clone(&self) -> Self {
        Self {
            parameters: self.parameters.clone(),
            _kind: PhantomData,
        }
    }
}

impl<K> fmt::Debug for Filter<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("kind", &std::any::type_name::<K>())
            .field("parameters", &self.parameters)
            .finish()
    }
}

impl<K> PartialEq for Filter<K> {
    fn eq(&self, other: &Self) -> bool {
        self.parameters == other.parameters
    }
}

impl<K> ParameterFilter for Filter<K> {
    fn as_map(&self) -> BTreeMap<String, FilterValue> {
        self.parameters.clone()
    }
}

impl ParameterFilter for BTreeMap<String, FilterValue> {
    fn as_map(&self) -> BTreeMap<String, FilterValue> {
        self.clone()
    }
}

impl<K: SelectsFields> Filter<K> {
    /// Comma-separated field list to include (or exclude, when `include` is false).
    pub fn with_fields(self, fields: &str, include: bool) -> Self {
        self.put(KEY_FIELDS, fields).put(KEY_INCLUDE_FIELDS, include)
    }
}

impl<K: PagesByOffset> Filter<K> {
    pub fn with_page(self, page: i32, per_page: i32) -> Self {
        self.put(KEY_PAGE, page).put(KEY_PER_PAGE, per_page)
    }
}

impl<K: IncludesTotals> Filter<K> {
    pub fn with_totals(self, include_totals: bool) -> Self {
        self.put(KEY_INCLUDE_TOTALS, include_totals)
    }
}

impl<K: PagesByCheckpoint> Filter<K> {
    /// Opaque checkpoint id returned as `next` by the previous page.
    pub fn with_from(self, from: &str) -> Self {
        self.put(KEY_FROM, from)
    }

    pub fn with_take(self, take: i32) -> Self {
        self.put(KEY_TAKE, take)
    }
}

impl<K: Searches> Filter<K> {
    /// Free-text query. Encoded here rather than by the request builder
    /// because the backend expects the `q` value form-encoded exactly once.
    pub fn with_query(self, query: &str) -> Self {
        self.put(KEY_QUERY, FilterValue::Encoded(form_encode(query)))
    }

    /// Sort expression such as `created_at:-1`.
    pub fn with_sort(self, sort: &str) -> Self {
        self.put(KEY_SORT, sort)
    }
}

impl Filter<kind::User> {
    pub fn with_search_engine(self, version: &str) -> Self {
        self.put("search_engine", version)
    }
}

impl Filter<kind::Client> {
    pub fn with_is_global(self, is_global: bool) -> Self {
        self.put("is_global", is_global)
    }

    pub fn with_is_first_party(self, is_first_party: bool) -> Self {
        self.put("is_first_party", is_first_party)
    }

    pub fn with_app_type(self, app_type: &str) -> Self {
        self.put("app_type", app_type)
    }
}

impl Filter<kind::DeviceCredentials> {
    pub fn with_user_id(self, user_id: &str) -> Self {
        self.put("user_id", user_id)
    }

    pub fn with_client_id(self, client_id: &str) -> Self {
        self.put("client_id", client_id)
    }

    pub fn with_type(self, credential_type: &str) -> Self {
        self.put("type", credential_type)
    }
}

impl Filter<kind::Rules> {
    pub fn with_enabled(self, enabled: bool) -> Self {
        self.put("enabled", enabled)
    }
}

impl Filter<kind::UsersImport> {
    /// Replace existing users instead of failing on duplicates.
    pub fn with_upsert(self, upsert: bool) -> Self {
        self.put("upsert", upsert)
    }

    pub fn with_external_id(self, external_id: &str) -> Self {
        self.put("external_id", external_id)
    }

    pub fn with_send_completion_email(self, send: bool) -> Self {
        self.put("send_completion_email", send)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_is_stored_as_integers() {
        let map = PageFilter::new().with_page(5, 10).as_map();
        assert_eq!(map.get(KEY_PAGE), Some(&FilterValue::Int(5)));
        assert_eq!(map.get(KEY_PER_PAGE), Some(&FilterValue::Int(10)));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn setters_overwrite_instead_of_accumulating() {
        let map = QueryFilter::new()
            .with_page(1, 10)
            .with_page(2, 20)
            .with_sort("name:1")
            .with_sort("email:-1")
            .as_map();
        assert_eq!(map.get(KEY_PAGE), Some(&FilterValue::Int(2)));
        assert_eq!(map.get(KEY_PER_PAGE), Some(&FilterValue::Int(20)));
        assert_eq!(map.get(KEY_SORT), Some(&FilterValue::Text("email:-1".into())));
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn boolean_flags_are_real_booleans() {
        let map = FieldsFilter::new().with_fields("name,email", false).as_map();
        assert_eq!(map.get(KEY_FIELDS), Some(&FilterValue::Text("name,email".into())));
        assert_eq!(map.get(KEY_INCLUDE_FIELDS), Some(&FilterValue::Bool(false)));

        let map = ClientFilter::new().with_totals(true).with_is_global(false).as_map();
        assert_eq!(map.get(KEY_INCLUDE_TOTALS), Some(&FilterValue::Bool(true)));
        assert_eq!(map.get("is_global"), Some(&FilterValue::Bool(false)));
    }

    #[test]
    fn query_is_form_encoded_once() {
        let map = UserFilter::new()
            .with_query("email:\"john doe\" AND id=log123")
            .as_map();
        assert_eq!(
            map.get(KEY_QUERY),
            Some(&FilterValue::Encoded(
                "email%3A%22john+doe%22+AND+id%3Dlog123".into()
            ))
        );
    }

    #[test]
    fn form_encoding_matches_html_forms() {
        assert_eq!(form_encode("a b*c~d"), "a+b*c%7Ed");
        assert_eq!(form_encode("ü"), "%C3%BC");
        assert_eq!(form_encode("safe-._"), "safe-._");
    }

    #[test]
    fn checkpoint_filter_stores_from_and_take() {
        let map = CheckpointFilter::new().with_from("cursor123").with_take(50).as_map();
        assert_eq!(map.get(KEY_FROM), Some(&FilterValue::Text("cursor123".into())));
        assert_eq!(map.get(KEY_TAKE), Some(&FilterValue::Int(50)));
    }

    #[test]
    fn page_filter_allows_both_pagination_styles_unvalidated() {
        let map = PageFilter::new()
            .with_page(0, 5)
            .with_from("abc")
            .with_take(5)
            .as_map();
        assert_eq!(map.len(), 4);
    }

    #[test]
    fn snapshot_is_detached_from_filter() {
        let filter = UserFilter::new().with_search_engine("v3");
        let mut snapshot = filter.as_map();
        snapshot.insert("search_engine".into(), "v2".into());
        assert_eq!(
            filter.as_map().get("search_engine"),
            Some(&FilterValue::Text("v3".into()))
        );
    }

    #[test]
    fn device_credentials_and_rules_keys() {
        let map = DeviceCredentialsFilter::new()
            .with_user_id("auth0|1")
            .with_client_id("abc")
            .with_type("public_key")
            .as_map();
        assert_eq!(map.get("user_id"), Some(&FilterValue::Text("auth0|1".into())));
        assert_eq!(map.get("client_id"), Some(&FilterValue::Text("abc".into())));
        assert_eq!(map.get("type"), Some(&FilterValue::Text("public_key".into())));

        let map = RulesFilter::new().with_enabled(true).as_map();
        assert_eq!(map.get("enabled"), Some(&FilterValue::Bool(true)));
    }

    #[test]
    fn values_render_for_the_wire() {
        assert_eq!(FilterValue::Bool(true).to_string(), "true");
        assert_eq!(FilterValue::Int(25).to_string(), "25");
        assert_eq!(
            FilterValue::List(vec!["a".into(), "b".into()]).to_string(),
            "a,b"
        );
    }
}
