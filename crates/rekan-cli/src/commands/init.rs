//! The `rekan init` command.

use std::path::Path;

use anyhow::{Context, Result};

use rekan_core::model::{Level, LicenseQuota};
use rekan_core::traits::LicenseStore;
use rekan_store::FileStore;

const DATA_DIR: &str = "rekan-data";
const DEMO_LICENSE: &str = "DEMO-SD";
const DEMO_SEATS: u32 = 30;

pub async fn execute() -> Result<()> {
    write_if_missing(Path::new("rekan.toml"), SAMPLE_CONFIG)?;

    let store = FileStore::open(DATA_DIR)
        .with_context(|| format!("failed to create data dir: {DATA_DIR}"))?;
    let bank_path = store.banks_dir().join("sd-matematika-1.toml");
    write_if_missing(&bank_path, SAMPLE_BANK)?;

    if store.read_license(DEMO_LICENSE).await?.is_some() {
        println!("License {DEMO_LICENSE} already exists, skipping.");
    } else {
        store
            .put_license(LicenseQuota {
                code: DEMO_LICENSE.into(),
                level: Some(Level::Sd),
                total_quota: DEMO_SEATS,
                used_count: 0,
            })
            .await?;
        println!("Created license {DEMO_LICENSE} ({DEMO_SEATS} seats, SD)");
    }

    std::fs::create_dir_all("answer-sheets")?;
    write_if_missing(
        Path::new("answer-sheets/sd-matematika-1.toml"),
        SAMPLE_ANSWERS,
    )?;

    println!("\nNext steps:");
    println!("  1. Run: rekan validate --bank {}", bank_path.display());
    println!(
        "  2. Run: rekan score --bank {} --answers answer-sheets/sd-matematika-1.toml",
        bank_path.display()
    );
    println!(
        "  3. Run: rekan submit --bank {} --answers answer-sheets/sd-matematika-1.toml \\\n       --student \"Nama Siswa\" --class 6A --license {DEMO_LICENSE}",
        bank_path.display()
    );
    println!("  4. Run: rekan class-report --class 6A --license {DEMO_LICENSE}");

    Ok(())
}

fn write_if_missing(path: &Path, content: &str) -> Result<()> {
    if path.exists() {
        println!("{} already exists, skipping.", path.display());
    } else {
        std::fs::write(path, content)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Created {}", path.display());
    }
    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# rekan configuration

[store]
type = "file"
data_dir = "./rekan-data"

# Hosted database:
# [store]
# type = "rest"
# base_url = "https://your-project.supabase.co"
# api_key = "${REKAN_API_KEY}"
# timeout_secs = 30

[exam]
assessment_minutes = 60
survey_minutes = 30
"#;

const SAMPLE_BANK: &str = include_str!("../../../../question-banks/sd-matematika-1.toml");

const SAMPLE_ANSWERS: &str = include_str!("../../../../answer-sheets/sd-matematika-1.toml");
