//! Bot command parsing and dispatch.
//!
//! Commands arrive as plain message text (`/start <token>`,
//! `/tasks inbox`, `/tasks_inbox`). Replies go straight back through the
//! [`Messenger`]; slow work such as task listing is handed to the job
//! queue. A command that fails is reported to the admin chat and the
//! user gets a generic apology instead of silence.

use std::fmt::Write as _;
use std::sync::Arc;

use tracing::{error, info, warn};

use super::client::Update;
use super::Messenger;
use crate::linking::LinkService;
use crate::models::job::JobPayload;
use crate::models::task::TaskType;
use crate::queue::JobQueue;
use crate::{AppError, Result};

/// Reply for a token that is unknown, used, or expired.
pub const INVALID_LINK_REPLY: &str =
    "This link is invalid or has expired. Please generate a new one on the website's profile page.";

/// Reply when the chat is already bound to a different account.
pub const ALREADY_LINKED_REPLY: &str = "This Telegram account is already linked to another user. \
     Please unlink it from the other account before linking it to a new one.";

/// Reply for commands that require a linked account.
pub const NOT_LINKED_REPLY: &str =
    "Your account is not linked. Please use /start to link your account.";

/// Reply acknowledging a queued task listing.
pub const FETCHING_TASKS_REPLY: &str = "Fetching your tasks...";

/// Reply sent to the user when handling their message failed.
pub const UNEXPECTED_ERROR_REPLY: &str =
    "An unexpected error occurred while processing your request. The issue has been reported.";

/// Recognized bot command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    /// `/start`, optionally carrying a deep-link token.
    Start {
        /// Link token from the deep link payload.
        token: Option<String>,
    },
    /// `/tasks [type]` or `/tasks_<type>`; `all` or no argument lists every type.
    Tasks {
        /// Requested type filter.
        task_type: Option<TaskType>,
    },
}

/// Error for a `/tasks` argument that names no task type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTaskType(pub String);

impl BotCommand {
    /// Parse message text. Returns `None` for text that is not a known command.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownTaskType`] when `/tasks` names an unknown type.
    pub fn parse(text: &str) -> std::result::Result<Option<Self>, UnknownTaskType> {
        let mut words = text.split_whitespace();
        let Some(head) = words.next() else {
            return Ok(None);
        };
        let Some(command) = head.strip_prefix('/') else {
            return Ok(None);
        };
        // Group chats address commands as `/start@bot_name`.
        let command = command.split('@').next().unwrap_or(command);
        let arg = words.next();

        match command {
            "start" => Ok(Some(Self::Start {
                token: arg.map(str::to_owned),
            })),
            "tasks" => Ok(Some(Self::Tasks {
                task_type: parse_task_filter(arg)?,
            })),
            other => match other.strip_prefix("tasks_") {
                Some(suffix) => Ok(Some(Self::Tasks {
                    task_type: parse_task_filter(Some(suffix))?,
                })),
                None => Ok(None),
            },
        }
    }
}

fn parse_task_filter(arg: Option<&str>) -> std::result::Result<Option<TaskType>, UnknownTaskType> {
    match arg {
        None => Ok(None),
        Some(name) if name.eq_ignore_ascii_case("all") => Ok(None),
        Some(name) => TaskType::from_name(name)
            .map(Some)
            .ok_or_else(|| UnknownTaskType(name.to_owned())),
    }
}

/// Executes bot commands against the link service and job queue.
#[derive(Clone)]
pub struct CommandHandler {
    links: LinkService,
    queue: JobQueue,
    messenger: Arc<dyn Messenger>,
    admin_chat_id: Option<String>,
}

impl CommandHandler {
    /// Create a handler replying through `messenger`.
    #[must_use]
    pub fn new(links: LinkService, queue: JobQueue, messenger: Arc<dyn Messenger>) -> Self {
        Self {
            links,
            queue,
            messenger,
            admin_chat_id: None,
        }
    }

    /// Send error reports for failed updates to `admin_chat_id`.
    #[must_use]
    pub fn with_admin_chat(mut self, admin_chat_id: Option<String>) -> Self {
        self.admin_chat_id = admin_chat_id;
        self
    }

    /// Render the admin report for an update whose handling failed.
    #[must_use]
    pub fn error_report_text(update: &Update, err: &AppError) -> String {
        let mut text = format!(
            "Bot error while handling update {}\nError: {}\n{}",
            update.update_id,
            err.kind(),
            err
        );
        if let Some(message) = update.message.as_ref() {
            if let Some(from) = message.from.as_ref() {
                let name = from.username.as_deref().unwrap_or("unknown");
                let _ = write!(text, "\nUser: @{name} (ID: {})", from.id);
            }
            let _ = write!(text, "\nChat ID: {}", message.chat.id);
            if let Some(body) = message.text.as_deref() {
                let _ = write!(text, "\nMessage: {body}");
            }
        }
        text
    }

    /// Handle one update, turning a failure into an admin report and a
    /// user-facing apology. Never fails; delivery errors are logged.
    pub async fn process_update(&self, update: &Update) {
        let Err(err) = self.handle_update(update).await else {
            return;
        };
        error!(
            update_id = update.update_id,
            error_kind = err.kind(),
            %err,
            "bot update handling failed"
        );

        match self.admin_chat_id.as_deref() {
            Some(admin) => {
                let report = Self::error_report_text(update, &err);
                if let Err(report_err) = self.messenger.send_message(admin, &report).await {
                    error!(
                        update_id = update.update_id,
                        %report_err,
                        "bot error report delivery failed"
                    );
                }
            }
            None => warn!(
                update_id = update.update_id,
                "no admin chat configured; bot error report not sent"
            ),
        }

        if let Some(message) = update.message.as_ref() {
            let chat_id = message.chat.id.to_string();
            if let Err(reply_err) = self
                .messenger
                .send_message(&chat_id, UNEXPECTED_ERROR_REPLY)
                .await
            {
                warn!(chat_id, %reply_err, "could not tell the user about the failure");
            }
        }
    }

    /// Handle one update. Updates without a text message are ignored.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` on store failure and `AppError::Provider` if
    /// the reply cannot be delivered.
    pub async fn handle_update(&self, update: &Update) -> Result<()> {
        let Some(message) = update.message.as_ref() else {
            return Ok(());
        };
        let Some(text) = message.text.as_deref() else {
            return Ok(());
        };
        let chat_id = message.chat.id.to_string();
        let username = message.from.as_ref().and_then(|f| f.username.as_deref());

        let command = match BotCommand::parse(text) {
            Ok(Some(command)) => command,
            Ok(None) => return Ok(()),
            Err(UnknownTaskType(name)) => {
                let names: Vec<&str> = TaskType::ALL.iter().map(|t| t.as_str()).collect();
                let reply = format!(
                    "Unknown task type '{name}'. Use one of: all, {}.",
                    names.join(", ")
                );
                return self.messenger.send_message(&chat_id, &reply).await;
            }
        };

        match command {
            BotCommand::Start { token: Some(token) } => {
                self.link(&chat_id, &token, username).await
            }
            BotCommand::Start { token: None } => self.greet(&chat_id).await,
            BotCommand::Tasks { task_type } => self.list_tasks(&chat_id, task_type).await,
        }
    }

    async fn link(&self, chat_id: &str, token: &str, username: Option<&str>) -> Result<()> {
        let reply = match self.links.resolve(token, chat_id, username).await {
            Ok(user) => format!(
                "Success! Your Telegram account is now linked to your profile '{}'.",
                user.username
            ),
            Err(AppError::InvalidToken(_)) => INVALID_LINK_REPLY.to_owned(),
            Err(AppError::AlreadyLinked(_)) => ALREADY_LINKED_REPLY.to_owned(),
            Err(AppError::NotFound(_)) => {
                warn!(chat_id, "link token resolved to a missing user");
                "An error occurred: the user associated with this link could not be found."
                    .to_owned()
            }
            Err(err) => return Err(err),
        };
        self.messenger.send_message(chat_id, &reply).await
    }

    async fn greet(&self, chat_id: &str) -> Result<()> {
        let reply = match self.links.linked_user(chat_id).await? {
            Some(user) => format!(
                "This Telegram account is already linked to the user '{}'. \
                 You can manage your linked accounts on the web application's profile page.",
                user.username
            ),
            None => format!(
                "Welcome! To link this Telegram account with your web profile:\n\n\
                 1. Log in to the web application.\n\
                 2. Go to your profile page.\n\
                 3. Click the 'Connect with Telegram' button.\n\n\
                 Your Chat ID is: {chat_id}"
            ),
        };
        self.messenger.send_message(chat_id, &reply).await
    }

    async fn list_tasks(&self, chat_id: &str, task_type: Option<TaskType>) -> Result<()> {
        if self.links.linked_user(chat_id).await?.is_none() {
            return self.messenger.send_message(chat_id, NOT_LINKED_REPLY).await;
        }

        let job = self
            .queue
            .enqueue(JobPayload::TaskList {
                chat_id: chat_id.to_owned(),
                task_type,
            })
            .await?;
        info!(chat_id, job_id = %job.id, "task list requested");
        self.messenger
            .send_message(chat_id, FETCHING_TASKS_REPLY)
            .await
    }
}
