use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use news_digest::api::{CannedApi, NewsApi, RepositoryApi};
use news_digest::config::Config;
use news_digest::router::{default_routes, Router};
use news_digest::storage::FileStore;
use news_digest::stores::{ArticleStore, SessionStore};
use news_digest::types::{
    Article, ArticleListState, Category, LoginCredentials, PaginationRequest, RegisterCredentials,
};

/// Get the config directory path (~/.config/news-digest/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    let config_dir = PathBuf::from(home).join(".config").join("news-digest");
    Ok(config_dir)
}

#[derive(Parser, Debug)]
#[command(name = "news-digest", about = "Personalized news digest in the terminal")]
struct Args {
    /// Config file (default: ~/.config/news-digest/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Serve fixed demo responses instead of the in-memory backend
    #[arg(long)]
    canned: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in with an email address or username
    Login {
        identifier: String,
        #[arg(long)]
        password: String,
    },

    /// Create an account and sign in
    Register {
        username: String,
        email: String,
        #[arg(long)]
        password: String,
        /// Defaults to --password
        #[arg(long)]
        confirm: Option<String>,
    },

    /// Forget the saved session
    Logout,

    /// Show the signed-in user
    Whoami {
        /// Reload the user from the backend
        #[arg(long)]
        verify: bool,
    },

    /// Show or replace your selected categories
    Categories {
        #[arg(long, value_name = "CATEGORY", num_args = 1..)]
        set: Option<Vec<Category>>,
    },

    /// List articles
    News {
        #[arg(long, default_value_t = 1)]
        page: u32,

        /// Only show these categories (repeatable)
        #[arg(long = "category", value_name = "CATEGORY")]
        categories: Vec<Category>,

        /// Only show your selected categories
        #[arg(long, conflicts_with = "categories")]
        mine: bool,

        /// Show a single article
        #[arg(long, conflicts_with_all = ["page", "categories", "mine"])]
        id: Option<u64>,
    },

    /// Resolve a path through the route guards
    Open { path: String },

    /// List the route table
    Routes,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
        tracing::debug!(path = %config_dir.display(), "Created config directory");
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) =
            std::fs::set_permissions(&config_dir, std::fs::Permissions::from_mode(0o700))
        {
            tracing::warn!(
                path = %config_dir.display(),
                error = %e,
                "Failed to set config directory permissions to 0700"
            );
        }
    }

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let api: Arc<dyn NewsApi> = if args.canned {
        Arc::new(CannedApi::new(config.latency()))
    } else {
        let accounts = Arc::new(FileStore::new(config_dir.join("users.json")));
        Arc::new(RepositoryApi::with_persisted_users(accounts, config.latency()))
    };

    let storage = Arc::new(FileStore::new(config_dir.join("session.json")));
    let session = SessionStore::with_storage_key(Arc::clone(&api), storage, &config.session_key);
    session.restore_from_storage();

    let articles = ArticleStore::with_page_size(api, config.page_size);

    match args.command {
        Command::Login {
            identifier,
            password,
        } => {
            session
                .login(&LoginCredentials::new(identifier, password))
                .await
                .context("Sign in failed")?;
            print_whoami(&session);
        }

        Command::Register {
            username,
            email,
            password,
            confirm,
        } => {
            let confirm = confirm.unwrap_or_else(|| password.clone());
            session
                .register(&RegisterCredentials::new(username, email, password, confirm))
                .await
                .context("Registration failed")?;
            print_whoami(&session);
        }

        Command::Logout => {
            session.logout();
            println!("Signed out.");
        }

        Command::Whoami { verify } => {
            if verify {
                session
                    .refresh_user()
                    .await
                    .context("Failed to verify session")?;
            }
            print_whoami(&session);
        }

        Command::Categories { set } => {
            if let Some(selection) = set {
                let selection: BTreeSet<Category> = selection.into_iter().collect();
                let updated = session
                    .update_categories(&selection)
                    .await
                    .context("Failed to update categories")?;
                if !updated {
                    anyhow::bail!("Sign in to choose categories");
                }
            }
            let selected = session.user_categories();
            for category in Category::ALL {
                let mark = if selected.contains(&category) { "*" } else { " " };
                println!("[{mark}] {category}");
            }
        }

        Command::News {
            page,
            categories,
            mine,
            id,
        } => {
            if let Some(id) = id {
                let article = articles
                    .article(id)
                    .await
                    .with_context(|| format!("Failed to load article {id}"))?;
                print_article(&article, true);
                return Ok(());
            }

            let filter = if mine {
                if !session.is_authenticated() {
                    anyhow::bail!("--mine requires a signed-in user");
                }
                Some(session.user_categories())
            } else if categories.is_empty() {
                None
            } else {
                Some(categories.into_iter().collect())
            };

            let request = PaginationRequest::new(page, articles.page_size()).with_categories(filter);
            if !articles.fetch_page(request).await {
                let state = articles.state();
                anyhow::bail!(state.error.unwrap_or_else(|| "Failed to fetch news".to_string()));
            }
            print_listing(&articles.state());
        }

        Command::Open { path } => {
            let mut router = Router::with_default_title(default_routes(), config.app_title);
            let nav = router
                .navigate(&path, &session)
                .with_context(|| format!("Cannot open {path}"))?;
            match &nav.redirected_from {
                Some(from) => println!("{from} -> {} ({})", nav.path, nav.route),
                None => println!("{} ({})", nav.path, nav.route),
            }
            println!("Title: {}", router.document_title());
        }

        Command::Routes => {
            let router = Router::with_default_title(default_routes(), config.app_title);
            for route in router.routes() {
                let access = if route.requires_auth {
                    "signed in"
                } else if route.requires_guest {
                    "signed out"
                } else {
                    "anyone"
                };
                println!("{:<10} {:<10} {access}", route.path, route.name);
            }
        }
    }

    Ok(())
}

fn print_whoami(session: &SessionStore) {
    match session.current_user() {
        Some(user) => {
            let categories: Vec<&str> = user
                .selected_categories
                .iter()
                .map(|c| c.as_str())
                .collect();
            println!("Signed in as {} <{}>", user.username, user.email);
            println!("Categories: {}", categories.join(", "));
        }
        None => println!("Not signed in."),
    }
}

fn print_listing(state: &ArticleListState) {
    if state.articles.is_empty() {
        println!("No articles.");
        return;
    }
    for article in &state.articles {
        print_article(article, false);
    }
    println!("Page {} of {}", state.current_page, state.total_pages);
}

fn print_article(article: &Article, full: bool) {
    println!(
        "#{:<3} [{}] {} ({})",
        article.id,
        article.category,
        article.title,
        article.date.format("%Y-%m-%d")
    );
    if full {
        println!("     {}", article.summary);
        println!("     {}", article.source_url);
    }
}
