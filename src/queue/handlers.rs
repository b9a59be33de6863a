//! Job handlers, one per [`JobKind`].

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::debug;

use crate::models::job::{Job, JobKind, JobPayload};
use crate::persistence::db::Database;
use crate::persistence::task_repo::TaskRepo;
use crate::persistence::user_repo::UserRepo;
use crate::telegram::{split_message, Messenger, MAX_MESSAGE_LEN};
use crate::{AppError, Result};

/// Reply to a task listing from a chat with no linked account.
pub const UNLINKED_LIST_REPLY: &str = "Your account is not linked.";

/// Reply to a task listing that matched nothing.
pub const EMPTY_LIST_REPLY: &str = "No tasks found for this type.";

/// Executes one kind of job.
///
/// Handlers must tolerate running more than once for the same job:
/// delivery is at-least-once. A retried multi-part reply may repeat the
/// parts sent before the failure.
pub trait JobHandler: Send + Sync {
    /// Run the job. An error counts as a failed attempt.
    ///
    /// # Errors
    ///
    /// Any [`AppError`]; the worker decides between retry and failure.
    fn handle(&self, job: &Job) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Handler table keyed by job kind.
pub type HandlerTable = HashMap<JobKind, Arc<dyn JobHandler>>;

/// Build the standard handler table over `messenger`.
#[must_use]
pub fn default_handlers(db: &Arc<Database>, messenger: &Arc<dyn Messenger>) -> HandlerTable {
    let mut table: HandlerTable = HashMap::new();
    table.insert(
        JobKind::SendMessage,
        Arc::new(SendMessageHandler::new(Arc::clone(messenger))),
    );
    table.insert(
        JobKind::TaskList,
        Arc::new(TaskListHandler::new(Arc::clone(db), Arc::clone(messenger))),
    );
    table
}

fn mismatch(job: &Job, expected: JobKind) -> AppError {
    AppError::Queue(format!(
        "job {} has kind {} but was routed to the {} handler",
        job.id,
        job.kind().as_str(),
        expected.as_str()
    ))
}

/// Delivers [`JobPayload::SendMessage`] jobs.
pub struct SendMessageHandler {
    messenger: Arc<dyn Messenger>,
}

impl SendMessageHandler {
    /// Create a handler sending through `messenger`.
    #[must_use]
    pub fn new(messenger: Arc<dyn Messenger>) -> Self {
        Self { messenger }
    }
}

impl JobHandler for SendMessageHandler {
    fn handle(&self, job: &Job) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let job = job.clone();
        Box::pin(async move {
            let JobPayload::SendMessage { chat_id, text } = &job.payload else {
                return Err(mismatch(&job, JobKind::SendMessage));
            };
            for chunk in split_message(text, MAX_MESSAGE_LEN) {
                self.messenger.send_message(chat_id, &chunk).await?;
            }
            debug!(job_id = %job.id, chat_id, "message delivered");
            Ok(())
        })
    }
}

/// Answers [`JobPayload::TaskList`] jobs with the linked user's open tasks.
pub struct TaskListHandler {
    users: UserRepo,
    tasks: TaskRepo,
    messenger: Arc<dyn Messenger>,
}

impl TaskListHandler {
    /// Create a handler reading from `db`.
    #[must_use]
    pub fn new(db: Arc<Database>, messenger: Arc<dyn Messenger>) -> Self {
        Self {
            users: UserRepo::new(Arc::clone(&db)),
            tasks: TaskRepo::new(db),
            messenger,
        }
    }
}

impl JobHandler for TaskListHandler {
    fn handle(&self, job: &Job) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let job = job.clone();
        Box::pin(async move {
            let JobPayload::TaskList { chat_id, task_type } = &job.payload else {
                return Err(mismatch(&job, JobKind::TaskList));
            };

            let Some(user) = self.users.get_by_chat_id(chat_id).await? else {
                return self
                    .messenger
                    .send_message(chat_id, UNLINKED_LIST_REPLY)
                    .await;
            };

            let tasks = self.tasks.list_open_for_user(user.id, *task_type).await?;
            let reply = if tasks.is_empty() {
                EMPTY_LIST_REPLY.to_owned()
            } else {
                let label = task_type.map_or("all", |t| t.as_str());
                let mut reply = format!("Tasks for type: {label}\n\n");
                for task in &tasks {
                    reply.push_str(&format!("- {} (ID: {})\n", task.title, task.id));
                }
                reply
            };

            // Long listings go out as several messages.
            for chunk in split_message(&reply, MAX_MESSAGE_LEN) {
                self.messenger.send_message(chat_id, &chunk).await?;
            }
            debug!(job_id = %job.id, chat_id, tasks = tasks.len(), "task list delivered");
            Ok(())
        })
    }
}
