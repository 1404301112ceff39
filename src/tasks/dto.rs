use serde::Deserialize;

/// Create/edit form. Blank optional fields arrive as empty strings.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct TaskForm {
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    pub deadline: Option<String>,
    pub priority: Option<String>,
}

/// Query string of the task list (`?q=&sort=&order=`).
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ListQuery {
    pub q: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortBy {
    /// Creation time.
    Date,
    #[default]
    Deadline,
}

impl SortBy {
    /// Anything other than `date` sorts by deadline.
    pub fn from_param(raw: Option<&str>) -> Self {
        match raw {
            Some("date") => SortBy::Date,
            _ => SortBy::Deadline,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortBy::Date => "date",
            SortBy::Deadline => "deadline",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    /// Anything other than `desc` is ascending.
    pub fn from_param(raw: Option<&str>) -> Self {
        match raw {
            Some("desc") => SortOrder::Desc,
            _ => SortOrder::Asc,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Normalised list parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListParams {
    pub q: Option<String>,
    pub sort: SortBy,
    pub order: SortOrder,
}

impl From<&ListQuery> for ListParams {
    fn from(query: &ListQuery) -> Self {
        Self {
            q: query
                .q
                .as_deref()
                .map(str::trim)
                .filter(|q| !q.is_empty())
                .map(str::to_string),
            sort: SortBy::from_param(query.sort.as_deref()),
            order: SortOrder::from_param(query.order.as_deref()),
        }
    }
}
