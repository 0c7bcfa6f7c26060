//! Seeds the catalog tables: role ladders, administrator accounts,
//! department roles, courses and permission rules.
//!
//! Idempotent by default (INSERT OR IGNORE); `--fresh` wipes the catalog
//! tables first. Failures in one section are logged and do not abort the
//! remaining sections.

use clap::Parser;
use sqlx::SqlitePool;
use uuid::Uuid;

const MILITARY: [&str; 15] = [
    "Recruta",
    "Soldado",
    "Cabo",
    "Sargento",
    "Subtenente",
    "Aspirante a Oficial",
    "Tenente",
    "Capitão",
    "Major",
    "Coronel",
    "General",
    "Comandante",
    "Comandante-Geral",
    "Conselheiro",
    "Supremo",
];

/// Executive ladder starts at position 2 so both ladders share the same
/// position scale.
const EXECUTIVE: [&str; 11] = [
    "Estagiário",
    "Analista",
    "Agente",
    "Inspetor",
    "Perito",
    "Escrivão",
    "Investigador",
    "Delegado",
    "Comissário",
    "Diretor",
    "Chanceler",
];

/// promotes_until_role_position per position, indexed by hierarchy position.
const PROMOTION_RANGE: [i64; 15] = [0, 0, 0, 0, 1, 2, 4, 4, 5, 6, 7, 8, 9, 11, 12];

const DAYS_TO_BE_PROMOTED: [i64; 15] = [0, 0, 0, 0, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 0];

const ADMINS: [(&str, &str); 3] = [
    ("HaveSomeHope!", "Conselheiro"),
    ("Realgabri169", "Supremo"),
    ("Rakis", "Supremo"),
];

// (acronym, name, department, power_level)
const DEPARTMENT_ROLES: [(&str, &str, &str, i64); 40] = [
    ("INS", "Instrutor", "INS", 1),
    ("C.INS", "Coordenador dos Instrutores", "INS", 10),
    ("AL.INS", "Auxiliar da Liderança dos Instrutores", "INS", 11),
    ("VL.INS", "Vice Lider dos Instrutores", "INS", 12),
    ("L.INS", "Lider dos Instrutores", "INS", 13),
    ("ESP", "Especializador", "ESP", 1),
    ("C.ESP", "Coordenador dos Especializadores", "ESP", 10),
    ("AL.ESP", "Auxiliar da Liderança dos Especializadores", "ESP", 11),
    ("VL.ESP", "Vice Lider dos Especializadores", "ESP", 12),
    ("L.ESP", "Lider dos Especializadores", "ESP", 13),
    ("EFEX", "Instrutor-Executivo", "EFEX", 1),
    ("C.EFEX", "Coordenador dos Instrutores-Executivos", "EFEX", 10),
    ("AL.EFEX", "Auxiliar da Liderança dos Instrutores-Executivos", "EFEX", 11),
    ("VL.EFEX", "Vice Lider dos Instrutores-Executivos", "EFEX", 12),
    ("L.EFEX", "Lider dos Instrutores-Executivos", "EFEX", 13),
    ("CDO", "Professor do Centro de Desenvolvimento de Oficiais", "CDO", 1),
    ("C.CDO", "Coordenador do Centro de Desenvolvimento de Oficiais", "CDO", 10),
    ("AL.CDO", "Auxiliar da Liderança do Centro de Desenvolvimento de Oficiais", "CDO", 11),
    ("VL.CDO", "Vice Lider do Centro de Desenvolvimento de Oficiais", "CDO", 12),
    ("L.CDO", "Lider do Centro de Desenvolvimento de Oficiais", "CDO", 13),
    ("RH", "Membro de Recursos Humanos", "RH", 1),
    ("C.RH", "Coordenador de Recursos Humanos", "RH", 10),
    ("AL.RH", "Auxiliar da Liderança do Recursos Humanos", "RH", 11),
    ("VL.RH", "Vice Lider de Recursos Humanos", "RH", 12),
    ("L.RH", "Lider de Recursos Humanos", "RH", 13),
    ("MKT", "Membro do Departamento de Marketing", "MKT", 1),
    ("C.MKT", "Coordenador do Departamento de Marketing", "MKT", 10),
    ("AL.MKT", "Auxiliar do Departamento de Marketing", "MKT", 11),
    ("VL.MKT", "Vice Lider do Departamento de Marketing", "MKT", 12),
    ("L.MKT", "Lider do Departamento de Marketing", "MKT", 13),
    ("PTR", "Patrulheiro", "PTR", 1),
    ("C.PTR", "Coordenador da Patrulha", "PTR", 10),
    ("AL.PTR", "Auxiliar da Patrulha", "PTR", 11),
    ("VL.PTR", "Vice Lider da Patrulha", "PTR", 12),
    ("L.PTR", "Lider da Patrulha", "PTR", 13),
    ("CDT", "Membro do Centro de Desenvolvimento Tecnológico", "CDT", 1),
    ("C.CDT", "Coordenador do Centro de Desenvolvimento Tecnológico", "CDT", 10),
    ("AL.CDT", "Auxiliar do Centro de Desenvolvimento Tecnológico", "CDT", 11),
    ("VL.CDT", "Vice Lider do Centro de Desenvolvimento Tecnológico", "CDT", 12),
    ("L.CDT", "Lider do Centro de Desenvolvimento Tecnológico", "CDT", 13),
];

// (acronym, name, document, department)
const COURSES: [(&str, &str, &str, &str); 10] = [
    (
        "CFPM",
        "Curso de Formação Policial Militar",
        "https://docs.google.com/document/d/e/2PACX-1vTVswuqjNF2Ks7XSAa5v3LDxU21tbh4pOaRaJfuswW1MEfxqe-TaGkDcSyKTQR216KC_oA10jujDxnI/pub?embedded=true",
        "INS",
    ),
    (
        "COrt",
        "Curso de Ortogafia",
        "https://docs.google.com/document/d/e/2PACX-1vTGWJy-83J6ESzTs9moClurbJNiT69hNgmPMXdmETPy9FHljfYnv-azStulOOxK3tqRNy1gAuHHLBjc/pub?embedded=true",
        "INS",
    ),
    (
        "CPP",
        "Curso de Planejamento Policial",
        "https://docs.google.com/document/d/e/2PACX-1vS1WE09vWm3WErs27BijSFX3phCjeipAhqcUa6h_XpTYQeXZ3K-nYvsZiiqaoZSVTedVk0AQe5WCkil/pub?embedded=true",
        "INS",
    ),
    (
        "ECb",
        "Especialização de Cabos",
        "https://docs.google.com/document/d/e/2PACX-1vSv656_powpvdRofOEvnOzromSGwByOlv539vSTmkym3abFQkVxEqmgfa2EOhrCMF8FsVxRVGg1NDit/pub?embedded=true",
        "ESP",
    ),
    (
        "ESgt",
        "Especialização de Sargentos",
        "https://docs.google.com/document/d/e/2PACX-1vQoHJcY_NZ0neL2JgrXzuR9HhyFpiniMuwiGF6TBJts3zKqgN79hVg5jk-FIXvwJtNiCM4OCUG80FTW/pub?embedded=true",
        "ESP",
    ),
    (
        "ESbt",
        "Especialização de Subtenentes",
        "https://docs.google.com/document/d/e/2PACX-1vTb3TjSuNUjJD90HMjiQkEiaU_JUvLJQXzFv6c4k5ecgqV4ZnfLJiaI9vqexPY4EyBEZxMdWY0zLve-/pub?embedded=true",
        "ESP",
    ),
    (
        "CFO",
        "Curso de Formação de Oficiais",
        "https://docs.google.com/document/d/e/2PACX-1vQbaL553kxfgCRgdkHoSl7yXnhViQOwjXoCfodmZzHMV-PbPATRaHI40eUcXXUc1mlvsGdak_V_H8PZ/pub?embedded=true",
        "CDO",
    ),
    (
        "CFPE",
        "Curso de Formação Policial Executiva",
        "https://docs.google.com/document/d/e/2PACX-1vTABOjnyEWZp2PULIL9IbaNI89hjRjC7RzKeGf6OKfXS3fEmr4075gqaasbsOTUOihfwCzwAUtFwMY8/pub?embedded=true",
        "EFEX",
    ),
    (
        "CApEx",
        "Curso de Aperfeiçoamento Executivo",
        "https://docs.google.com/document/d/e/2PACX-1vTQVhKQulkUlqluzR20_iq6XM8ybDPkerR7p0SRkwJ1xQURI6TYdiTSkvnwGdCAhVwnItgDsL2yqXab/pub?embedded=true",
        "EFEX",
    ),
    (
        "CFC",
        "Curso de Formação Complementar",
        "https://docs.google.com/document/d/e/2PACX-1vQTRpeXBumwE7pEPjuBg_MlpabNXR6aHpP7kJvYCj8xETfgx5nqa07A_R0bsgQPTjzDEc7r1nkvgWn7/pub?embedded=true",
        "EFEX",
    ),
];

// (action, name, kind, role_name, hierarchy_kind)
const PERMISSION_RULES: [(&str, &str, &str, Option<&str>, Option<&str>); 8] = [
    ("BE_PROMOTED", "ECb", "COURSE", Some("Cabo"), None),
    ("BE_PROMOTED", "ESgt", "COURSE", Some("Sargento"), None),
    ("PROMOTE", "ESbt", "COURSE", Some("Subtenente"), None),
    ("BE_PROMOTED", "ESbt", "COURSE", Some("Subtenente"), None),
    ("BE_PROMOTED", "CFO", "COURSE", Some("Aspirante a Oficial"), None),
    ("PROMOTE", "CFO", "OTHER", Some("Aspirante a Oficial"), Some("EXECUTIVE")),
    ("DEMOTE", "CFO", "OTHER", Some("Aspirante a Oficial"), Some("EXECUTIVE")),
    ("WARN", "CFO", "OTHER", Some("Aspirante a Oficial"), Some("EXECUTIVE")),
];

#[derive(Parser)]
#[command(name = "seed", about = "Seed the catalog tables")]
struct Args {
    /// Delete existing catalog rows before inserting.
    #[arg(long)]
    fresh: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();

    let args = Args::parse();
    let pool = pme_system::db::init().await?;

    if args.fresh {
        for table in ["permissions_required", "courses", "department_roles", "roles"] {
            sqlx::query(&format!("DELETE FROM {table}"))
                .execute(&pool)
                .await?;
        }
        tracing::info!("catalog tables wiped");
    }

    if let Err(err) = seed_roles(&pool).await {
        tracing::warn!(error = %err, "could not seed roles");
    }
    if let Err(err) = seed_admins(&pool).await {
        tracing::warn!(error = %err, "could not seed administrators");
    }
    if let Err(err) = seed_department_roles(&pool).await {
        tracing::warn!(error = %err, "could not seed department roles");
    }
    if let Err(err) = seed_courses(&pool).await {
        tracing::warn!(error = %err, "could not seed courses");
    }
    if let Err(err) = seed_permission_rules(&pool).await {
        tracing::warn!(error = %err, "could not seed permission rules");
    }

    tracing::info!("seed finished");

    Ok(())
}

/// demote/gratify thresholds open up at position 5, fire at position 6; below
/// that the thresholds stay at 0 so junior ranks cannot act downward.
fn thresholds(position: i64) -> (i64, i64, i64) {
    let demote = if position <= 4 { 0 } else { position - 1 };
    let fire = if position <= 5 { 0 } else { position - 1 };
    let gratify = if position <= 4 { 0 } else { position - 1 };

    (demote, fire, gratify)
}

async fn insert_role(
    pool: &SqlitePool,
    name: &str,
    kind: &str,
    position: i64,
) -> anyhow::Result<()> {
    let (demote, fire, gratify) = thresholds(position);

    sqlx::query(
        "INSERT OR IGNORE INTO roles (name, hierarchy_kind, hierarchy_position, \
         promotes_until_role_position, demote_until_role_position, fire_until_role_position, \
         gratify_until_role_position, days_to_be_promoted) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(name)
    .bind(kind)
    .bind(position)
    .bind(PROMOTION_RANGE[position as usize])
    .bind(demote)
    .bind(fire)
    .bind(gratify)
    .bind(DAYS_TO_BE_PROMOTED[position as usize])
    .execute(pool)
    .await?;

    Ok(())
}

async fn seed_roles(pool: &SqlitePool) -> anyhow::Result<()> {
    for (index, name) in MILITARY.iter().enumerate() {
        insert_role(pool, name, "MILITARY", index as i64).await?;
    }
    for (index, name) in EXECUTIVE.iter().enumerate() {
        insert_role(pool, name, "EXECUTIVE", index as i64 + 2).await?;
    }

    tracing::info!("roles seeded");
    Ok(())
}

async fn seed_admins(pool: &SqlitePool) -> anyhow::Result<()> {
    for (nick, role) in ADMINS {
        sqlx::query(
            "INSERT OR IGNORE INTO members (id, nick, is_admin, role_name) VALUES (?, ?, 1, ?)",
        )
        .bind(Uuid::new_v4())
        .bind(nick)
        .bind(role)
        .execute(pool)
        .await?;
    }

    tracing::info!("administrators seeded");
    Ok(())
}

async fn seed_department_roles(pool: &SqlitePool) -> anyhow::Result<()> {
    for (acronym, name, department, power_level) in DEPARTMENT_ROLES {
        sqlx::query(
            "INSERT OR IGNORE INTO department_roles (acronym, name, department, power_level) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(acronym)
        .bind(name)
        .bind(department)
        .bind(power_level)
        .execute(pool)
        .await?;
    }

    tracing::info!("department roles seeded");
    Ok(())
}

async fn seed_courses(pool: &SqlitePool) -> anyhow::Result<()> {
    for (acronym, name, document, department) in COURSES {
        sqlx::query(
            "INSERT OR IGNORE INTO courses (acronym, name, document, department, power_needed) \
             VALUES (?, ?, ?, ?, 1)",
        )
        .bind(acronym)
        .bind(name)
        .bind(document)
        .bind(department)
        .execute(pool)
        .await?;
    }

    tracing::info!("courses seeded");
    Ok(())
}

async fn seed_permission_rules(pool: &SqlitePool) -> anyhow::Result<()> {
    for (action, name, kind, role_name, hierarchy_kind) in PERMISSION_RULES {
        let exists: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM permissions_required WHERE action = ? AND name = ? AND kind = ?",
        )
        .bind(action)
        .bind(name)
        .bind(kind)
        .fetch_optional(pool)
        .await?;

        if exists.is_some() {
            continue;
        }

        sqlx::query(
            "INSERT INTO permissions_required (action, name, kind, role_name, hierarchy_kind) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(action)
        .bind(name)
        .bind(kind)
        .bind(role_name)
        .bind(hierarchy_kind)
        .execute(pool)
        .await?;
    }

    tracing::info!("permission rules seeded");
    Ok(())
}
