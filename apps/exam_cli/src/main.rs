use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use client_core::{
    aggregate, AuthSession, ExamArchiveApi, GatewayError, HttpGateway, PageTargets,
    ReloadCoordinator, TestDraft, ViewSlice,
};
use shared::{
    domain::{Category, TestId},
    protocol::{Credentials, TeacherPairing, TermTests},
};

mod config;

#[derive(Parser, Debug)]
#[command(name = "exam-archive", about = "Browse and submit academic tests")]
struct Args {
    /// API base URL; overrides the config file and EXAM_ARCHIVE_BASE_URL.
    #[arg(long)]
    base_url: Option<String>,
    /// Bearer token from a previous sign-in; overrides the config file and
    /// EXAM_ARCHIVE_TOKEN.
    #[arg(long)]
    token: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an account.
    SignUp {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Exchange credentials for a bearer token.
    SignIn {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Browse tests grouped by term and discipline.
    Disciplines {
        /// Narrow the listing by discipline name.
        #[arg(long)]
        search: Option<String>,
    },
    /// Browse tests grouped by instructor.
    Teachers {
        /// Narrow the listing by instructor name.
        #[arg(long)]
        search: Option<String>,
    },
    /// Submit a new test to the archive.
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        pdf_url: String,
        #[arg(long)]
        category: String,
        #[arg(long)]
        discipline: String,
        #[arg(long)]
        teacher: String,
    },
    /// Print a test's PDF link and register the view.
    Open { test_id: i64 },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();
    let settings = config::load_settings();

    let base_url = args.base_url.unwrap_or(settings.base_url);
    let gateway = Arc::new(HttpGateway::new(&base_url)?);
    let auth = match args.token.or(settings.token) {
        Some(token) => AuthSession::with_token(token),
        None => AuthSession::new(),
    };
    let coordinator = ReloadCoordinator::new(Arc::clone(&gateway), auth.clone());

    match args.command {
        Command::SignUp { email, password } => {
            gateway
                .sign_up(&Credentials { email, password })
                .await
                .map_err(friendly)?;
            println!("Account created. Sign in to get a token.");
        }
        Command::SignIn { email, password } => {
            let response = gateway
                .sign_in(&Credentials { email, password })
                .await
                .map_err(friendly)?;
            println!("{}", response.token);
            println!("Export it as EXAM_ARCHIVE_TOKEN to browse the archive.");
        }
        Command::Disciplines { search } => {
            ensure_token(&auth).await?;
            let terms = ViewSlice::new();
            let categories = ViewSlice::new();
            let targets = PageTargets::disciplines_page(terms.clone(), categories.clone());

            coordinator.load_page(&targets).await.map_err(friendly)?;
            if let Some(query) = search.as_deref().filter(|query| !query.is_empty()) {
                coordinator
                    .search_disciplines(query, &targets)
                    .await
                    .map_err(friendly)?;
            }

            render_disciplines(&terms.snapshot().await, &categories.snapshot().await);
        }
        Command::Teachers { search } => {
            ensure_token(&auth).await?;
            let pairings = ViewSlice::new();
            let categories = ViewSlice::new();
            let targets = PageTargets::instructors_page(pairings.clone(), categories.clone());

            coordinator.load_page(&targets).await.map_err(friendly)?;
            if let Some(query) = search.as_deref().filter(|query| !query.is_empty()) {
                coordinator
                    .search_teachers(query, &targets)
                    .await
                    .map_err(friendly)?;
            }

            render_teachers(&pairings.snapshot().await, &categories.snapshot().await);
        }
        Command::Add {
            name,
            pdf_url,
            category,
            discipline,
            teacher,
        } => {
            ensure_token(&auth).await?;
            let pairings = ViewSlice::new();
            let categories = ViewSlice::new();
            let targets = PageTargets::instructors_page(pairings.clone(), categories.clone());
            coordinator.load_page(&targets).await.map_err(friendly)?;

            let draft = TestDraft {
                name,
                pdf_url,
                category_name: category,
                discipline_name: discipline,
                teacher_name: teacher,
            };
            coordinator
                .submit_test(&draft, &categories.snapshot().await, &pairings.snapshot().await)
                .await?;
            println!("Test submitted.");
        }
        Command::Open { test_id } => {
            ensure_token(&auth).await?;
            let pairings = ViewSlice::new();
            let categories = ViewSlice::new();
            let targets = PageTargets::instructors_page(pairings.clone(), categories.clone());
            coordinator.load_page(&targets).await.map_err(friendly)?;

            let test_id = TestId(test_id);
            let loaded = pairings.snapshot().await;
            let Some(test) = loaded
                .iter()
                .flat_map(|pairing| pairing.tests.iter())
                .find(|test| test.id == test_id)
            else {
                anyhow::bail!("no test with id {} in the archive", test_id.0);
            };
            println!("{}", test.pdf_url);

            if let Err(err) = coordinator.register_test_view(test_id, &targets).await {
                eprintln!("Could not register the view. Please sign in again.");
                return Err(err.into());
            }

            // The reload above brought back the authoritative count.
            let views = pairings
                .snapshot()
                .await
                .iter()
                .flat_map(|pairing| &pairing.tests)
                .find(|test| test.id == test_id)
                .map(|test| test.views);
            if let Some(views) = views {
                println!("{views} views");
            }
        }
    }

    Ok(())
}

async fn ensure_token(auth: &AuthSession) -> Result<()> {
    if auth.token().await.is_none() {
        anyhow::bail!("no token configured; sign in first, then pass --token or set EXAM_ARCHIVE_TOKEN");
    }
    Ok(())
}

fn friendly(err: GatewayError) -> anyhow::Error {
    if err.is_unauthorized() {
        anyhow::Error::new(err).context("Please sign in again")
    } else {
        anyhow::Error::new(err).context("Request failed, please try again")
    }
}

fn render_disciplines(terms: &[TermTests], categories: &[Category]) {
    if terms.is_empty() {
        println!("No tests found.");
        return;
    }

    for term in terms {
        println!("Term {}", term.number);
        if term.disciplines.is_empty() {
            println!("  no tests for this term");
            continue;
        }
        for discipline in &term.disciplines {
            println!("  {}", discipline.name);
            let pairings = &discipline.teacher_disciplines;
            if pairings.is_empty() {
                println!("    no tests for this discipline");
                continue;
            }
            for category in categories
                .iter()
                .filter(|category| aggregate::category_has_tests(category, pairings))
            {
                println!("    {}", category.name);
                for pairing in pairings {
                    for test in aggregate::tests_of_category(category.id, &pairing.tests) {
                        println!(
                            "      #{} {} ({}) [{} views] {}",
                            test.id.0, test.name, pairing.teacher.name, test.views, test.pdf_url
                        );
                    }
                }
            }
        }
    }
}

fn render_teachers(pairings: &[TeacherPairing], categories: &[Category]) {
    let teachers = aggregate::unique_teacher_names(pairings);
    if teachers.is_empty() {
        println!("No tests found.");
        return;
    }

    for teacher in &teachers {
        println!("{teacher}");
        for category in categories
            .iter()
            .filter(|category| aggregate::teacher_category_has_tests(category, teacher, pairings))
        {
            println!("  {}", category.name);
            for pairing in aggregate::pairings_for_teacher(teacher, pairings) {
                for test in aggregate::tests_of_category(category.id, &pairing.tests) {
                    println!(
                        "    #{} {} ({}) [{} views] {}",
                        test.id.0, test.name, pairing.discipline.name, test.views, test.pdf_url
                    );
                }
            }
        }
    }
}
