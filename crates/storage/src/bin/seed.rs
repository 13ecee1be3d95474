use std::fmt;

use lesson_core::model::{
    CourseChainEntry, CourseId, Enrollment, Lesson, LessonId, MediaRef, PackageId, UserId,
};
use storage::repository::Storage;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    user_id: UserId,
    package_id: PackageId,
    courses: u32,
    lessons: u32,
    lesson_seconds: u32,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidNumber { flag: &'static str, raw: String },
    InvalidDbUrl { raw: String },
    IdOverflow { package: u64 },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidNumber { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::IdOverflow { package } => {
                write!(f, "--package-id {package} is too large to derive course and lesson ids")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_number<T: std::str::FromStr>(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<T, ArgsError> {
    let value = require_value(args, flag)?;
    value
        .parse()
        .map_err(|_| ArgsError::InvalidNumber { flag, raw: value })
}

fn env_number<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("PROGRESSION_DB_URL").unwrap_or_else(|_| "sqlite:dev.sqlite3".into());
        let mut user_id = UserId::new(env_number("PROGRESSION_USER_ID", 1));
        let mut package_id = PackageId::new(env_number("PROGRESSION_PACKAGE_ID", 1));
        let mut courses = env_number("PROGRESSION_COURSES", 2);
        let mut lessons = env_number("PROGRESSION_LESSONS", 3);
        let mut lesson_seconds = env_number("PROGRESSION_LESSON_SECONDS", 300);

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--user-id" => user_id = UserId::new(parse_number(&mut args, "--user-id")?),
                "--package-id" => {
                    package_id = PackageId::new(parse_number(&mut args, "--package-id")?);
                }
                "--courses" => courses = parse_number(&mut args, "--courses")?,
                "--lessons" => lessons = parse_number(&mut args, "--lessons")?,
                "--lesson-seconds" => {
                    lesson_seconds = parse_number(&mut args, "--lesson-seconds")?;
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            user_id,
            package_id,
            courses,
            lessons,
            lesson_seconds,
        })
    }
}

/// Course ids are `package * 100 + n`, lesson ids `course * 1000 + n`.
fn course_id_for(package: PackageId, index: u32) -> Result<CourseId, ArgsError> {
    package
        .value()
        .checked_mul(100)
        .and_then(|base| base.checked_add(u64::from(index) + 1))
        .map(CourseId::new)
        .ok_or(ArgsError::IdOverflow {
            package: package.value(),
        })
}

fn lesson_id_for(
    package: PackageId,
    course_id: CourseId,
    index: u32,
) -> Result<LessonId, ArgsError> {
    course_id
        .value()
        .checked_mul(1000)
        .and_then(|base| base.checked_add(u64::from(index) + 1))
        .map(LessonId::new)
        .ok_or(ArgsError::IdOverflow {
            package: package.value(),
        })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:dev.sqlite3)");
    eprintln!("  --user-id <id>            Learner enrolled in the first course (default: 1)");
    eprintln!("  --package-id <id>         Package holding the seeded courses (default: 1)");
    eprintln!("  --courses <n>             Courses in the package (default: 2)");
    eprintln!("  --lessons <n>             Lessons per course (default: 3)");
    eprintln!("  --lesson-seconds <n>      Video length of each lesson (default: 300)");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags, `.env` is loaded first):");
    eprintln!(
        "  PROGRESSION_DB_URL, PROGRESSION_USER_ID, PROGRESSION_PACKAGE_ID, PROGRESSION_COURSES,"
    );
    eprintln!("  PROGRESSION_LESSONS, PROGRESSION_LESSON_SECONDS");
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;
    for c in 0..args.courses {
        let course_id = course_id_for(args.package_id, c)?;
        storage
            .course_chain
            .upsert_chain_entry(&CourseChainEntry {
                course_id,
                package_id: args.package_id,
                order_index: c,
            })
            .await?;

        for l in 0..args.lessons {
            let lesson_id = lesson_id_for(args.package_id, course_id, l)?;
            let lesson = Lesson::new(
                lesson_id,
                course_id,
                format!("Course {} · Lesson {}", c + 1, l + 1),
                l,
                args.lesson_seconds,
                MediaRef::new(format!("demo-{lesson_id}"))?,
            )?;
            storage.lessons.upsert_lesson(&lesson).await?;
        }

        if c == 0 {
            storage
                .enrollments
                .insert_enrollment(&Enrollment::new(args.user_id, course_id))
                .await?;
        }
        tracing::info!(%course_id, lessons = args.lessons, "seeded course");
    }

    println!(
        "Seeded package {} with {} courses of {} lessons into {}",
        args.package_id, args.courses, args.lessons, args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "storage=info,seed=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
