use anyhow::{bail, Context, Result};
use std::env;
use std::path::Path;

use student_import::{
    get_all_students, get_student_by_prn, verify_count, AppConfig, ImportPipeline,
    ReconciliationEngine, SpreadsheetParser, StudentStore,
};

const USAGE: &str = "Usage:
  student-import import <file>   Import the first sheet of a spreadsheet (xlsx, xls, ods, csv)
  student-import list            Print every stored student
  student-import show <prn>      Print one student

The database path comes from DATABASE_PATH (default: students.db).";

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "student_import=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    let config = AppConfig::from_env()?;

    match args.get(1).map(String::as_str) {
        Some("import") => {
            let file = args.get(2).context("import needs a spreadsheet path")?;
            run_import(&config, Path::new(file))
        }
        Some("list") => run_list(&config),
        Some("show") => {
            let prn = args.get(2).context("show needs a PRN")?;
            run_show(&config, prn)
        }
        Some("-h") | Some("--help") | None => {
            println!("{}", USAGE);
            Ok(())
        }
        Some(other) => bail!("unknown command '{}'\n\n{}", other, USAGE),
    }
}

fn open_store(config: &AppConfig) -> Result<StudentStore> {
    StudentStore::open(&config.database_path, config.busy_timeout)
        .with_context(|| format!("Failed to open database {}", config.database_path.display()))
}

fn run_import(config: &AppConfig, file: &Path) -> Result<()> {
    println!("📂 Importing {}", file.display());

    let engine = ReconciliationEngine::new().with_commit_policy(config.commit_policy);
    let pipeline = ImportPipeline::new(SpreadsheetParser::new(), engine);

    // 1. Parse + validate before opening the store
    let records = pipeline.prepare_path(file)?;
    println!("✓ {} valid rows", records.len());

    // 2. Reconcile
    let mut store = open_store(config)?;
    let report = pipeline.reconcile(&mut store, &records)?;
    println!("✓ {}", report.summary());

    // 3. Verify
    let count = verify_count(store.connection())?;
    println!("✓ Database contains {} students", count);

    store.close()?;
    Ok(())
}

fn run_list(config: &AppConfig) -> Result<()> {
    let store = open_store(config)?;
    let students = get_all_students(store.connection())?;

    for student in &students {
        println!(
            "{:<12} {:<6} {:<24} {:<6} {:<8} {:<2} {}",
            student.prn,
            student.roll_number,
            student.name,
            student.class_name,
            student.branch,
            student.gender,
            student.date_of_birth
        );
    }
    println!("{} students", students.len());

    store.close()?;
    Ok(())
}

fn run_show(config: &AppConfig, prn: &str) -> Result<()> {
    let store = open_store(config)?;

    match get_student_by_prn(store.connection(), prn)? {
        Some(student) => println!("{}", serde_json::to_string_pretty(&student)?),
        None => bail!("no student with PRN {}", prn),
    }

    store.close()?;
    Ok(())
}
