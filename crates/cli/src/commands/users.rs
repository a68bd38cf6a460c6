//! User Commands

use anyhow::Result;
use clap::Subcommand;
use fetchkit_common::{ApiClient, NewUser, User, UserPatch, UserService};

use crate::output::{print_item, print_list, print_success, OutputFormat, TableDisplay};

#[derive(Subcommand)]
pub enum UserCommands {
    /// List all users
    List,

    /// Get user details
    Get {
        /// User ID
        id: u64,
    },

    /// Search users
    Search {
        /// Search query
        query: String,
    },

    /// Create a new user
    Create {
        /// Display name
        #[arg(short, long)]
        name: String,

        /// Email address
        #[arg(short, long)]
        email: String,

        /// Avatar URL
        #[arg(long)]
        avatar: Option<String>,
    },

    /// Update an existing user
    Update {
        /// User ID
        id: u64,

        /// New display name
        #[arg(short, long)]
        name: Option<String>,

        /// New email address
        #[arg(short, long)]
        email: Option<String>,

        /// Mark the user active or inactive
        #[arg(long)]
        active: Option<bool>,
    },

    /// Delete a user
    Delete {
        /// User ID
        id: u64,
    },
}

impl TableDisplay for User {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "Name", "Email", "Active"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.name.clone(),
            self.email.clone(),
            self.is_active
                .map(|active| active.to_string())
                .unwrap_or_else(|| "-".to_string()),
        ]
    }
}

pub async fn execute(cmd: UserCommands, api: ApiClient, format: OutputFormat) -> Result<()> {
    let users = UserService::new(&api);

    match cmd {
        UserCommands::List => {
            let list = users.get_users().await?;
            print_list(&list, format);
        }

        UserCommands::Get { id } => {
            let user = users.get_user_by_id(id).await?;
            print_item(&user, format);
        }

        UserCommands::Search { query } => {
            let list = users.search_users(&query).await?;
            print_list(&list, format);
        }

        UserCommands::Create {
            name,
            email,
            avatar,
        } => {
            let user = users
                .create_user(&NewUser {
                    name,
                    email,
                    avatar,
                    is_active: Some(true),
                })
                .await?;
            print_success(&format!("Created user {}", user.id));
            print_item(&user, format);
        }

        UserCommands::Update {
            id,
            name,
            email,
            active,
        } => {
            let patch = UserPatch {
                name,
                email,
                is_active: active,
                ..Default::default()
            };
            if patch == UserPatch::default() {
                anyhow::bail!("Nothing to update for user {}", id);
            }
            let user = users.update_user(id, &patch).await?;
            print_success(&format!("Updated user {}", id));
            print_item(&user, format);
        }

        UserCommands::Delete { id } => {
            users.delete_user(id).await?;
            print_success(&format!("Deleted user {}", id));
        }
    }

    Ok(())
}
