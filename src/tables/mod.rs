//! Entity managers. Each owns the rows of one table and implements its
//! [`Table`](crate::schema::Table) lifecycle.

pub mod attachments;
pub mod categories;
pub mod edits;
pub mod messages;
pub mod mutes;
pub mod permissions;
pub mod standard_replies;
pub mod threads;
pub mod users;

pub use attachments::AttachmentsTable;
pub use categories::CategoriesTable;
pub use edits::EditsTable;
pub use messages::MessagesTable;
pub use mutes::MutesTable;
pub use permissions::PermissionsTable;
pub use standard_replies::StandardRepliesTable;
pub use threads::ThreadsTable;
pub use users::UsersTable;

use crate::core::Result;
use crate::result::{QueryResult, Record};
use crate::session::Session;

/// Parses every row of a result, in store order.
pub(crate) fn parse_all<T>(res: &QueryResult, parse: fn(Record<'_>) -> Result<T>) -> Result<Vec<T>> {
    res.records().map(parse).collect()
}

/// Parses the first row of a result, if any.
pub(crate) fn parse_first<T>(res: &QueryResult, parse: fn(Record<'_>) -> Result<T>) -> Result<Option<T>> {
    res.first().map(parse).transpose()
}

/// Runs creation statements in order.
pub(crate) async fn run_all(session: &dyn Session, statements: &[&str]) -> Result<()> {
    for sql in statements {
        session.execute(sql, &[]).await?;
    }
    Ok(())
}
