use crate::config::AdminBootstrap;
use crate::domain::directory::register_user;
use crate::domain::models::{EmployeeClass, NewUser, UserRole};
use crate::services::identity::IdentityDirectory;
use crate::store::ReviewStore;
use anyhow::Result;

const SALARIED_QUESTIONS: &[&str] = &[
    "Teamwork & Collaboration | Kerjasama & Kolaborasi dalam Tim",
    "Communication | Komunikasi",
    "Ownership & Accountability | Rasa Kepemilikan & Tanggung Jawab",
    "Problem Solving | Pemecahan Masalah",
    "Quality of Work | Kualitas Hasil Kerja",
];

const HOURLY_QUESTIONS: &[&str] = &[
    "Efektivitas Waktu;Selalu terlambat;Kadang terlambat;Selalu tepat waktu",
    "Keselamatan Kerja;Sering mengabaikan aturan;Kadang mengikuti aturan;Selalu mengikuti aturan",
    "Kerjasama Tim;Sulit bekerja sama;Cukup kooperatif;Sangat kooperatif",
];

pub async fn seed_all(
    store: &dyn ReviewStore,
    identity: &dyn IdentityDirectory,
    admin: Option<&AdminBootstrap>,
) -> Result<()> {
    seed_questions(store).await?;
    if let Some(admin) = admin {
        seed_admin(store, identity, admin).await?;
    }
    Ok(())
}

/// Writes the default list for every class that has none yet.
async fn seed_questions(store: &dyn ReviewStore) -> Result<()> {
    for class in EmployeeClass::ALL {
        if !store.question_list(class).await?.is_empty() {
            continue;
        }
        let defaults = match class {
            EmployeeClass::Salaried => SALARIED_QUESTIONS,
            EmployeeClass::Hourly => HOURLY_QUESTIONS,
        };
        let questions: Vec<String> = defaults.iter().map(|q| q.to_string()).collect();
        store.replace_question_list(class, &questions).await?;
        tracing::info!("Seeded {} default {} questions", questions.len(), class.as_str());
    }
    Ok(())
}

async fn seed_admin(
    store: &dyn ReviewStore,
    identity: &dyn IdentityDirectory,
    admin: &AdminBootstrap,
) -> Result<()> {
    if store.find_user_by_login(admin.login.trim()).await?.is_some() {
        tracing::debug!("Admin {} already present", admin.login);
        return Ok(());
    }
    let account = NewUser {
        login_handle: admin.login.clone(),
        secret: admin.secret.clone(),
        display_name: admin.display_name.clone(),
        employee_id: "ADMIN".to_string(),
        job_position: "Administrator".to_string(),
        class: EmployeeClass::Salaried,
        organization: Some("People & Culture".to_string()),
        job_level: Some("Administrator".to_string()),
    };
    let user = register_user(store, identity, account, UserRole::Admin).await?;
    tracing::info!("Bootstrapped admin account {}", user.id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::directory::sign_in;
    use crate::domain::questions::QuestionSet;
    use crate::services::identity::MemoryIdentityDirectory;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn seeding_is_idempotent_and_defaults_parse() {
        let store = MemoryStore::new();
        let identity = MemoryIdentityDirectory::new();
        let admin = AdminBootstrap {
            login: "people.ops".to_string(),
            secret: "change-me".to_string(),
            display_name: "People Ops".to_string(),
        };

        seed_all(&store, &identity, Some(&admin)).await.unwrap();
        seed_all(&store, &identity, Some(&admin)).await.unwrap();

        assert_eq!(store.list_users().await.unwrap().len(), 1);
        let signed_in = sign_in(&store, &identity, "people.ops", "change-me")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(signed_in.role, UserRole::Admin);

        for class in EmployeeClass::ALL {
            let set = QuestionSet::parse(class, &store.question_list(class).await.unwrap());
            assert!(set.skipped.is_empty());
            assert!(!set.questions.is_empty());
        }
    }

    #[tokio::test]
    async fn existing_questions_are_kept() {
        let store = MemoryStore::new();
        let identity = MemoryIdentityDirectory::new();
        store
            .replace_question_list(EmployeeClass::Salaried, &["Focus | Fokus".to_string()])
            .await
            .unwrap();
        seed_all(&store, &identity, None).await.unwrap();
        assert_eq!(
            store.question_list(EmployeeClass::Salaried).await.unwrap(),
            vec!["Focus | Fokus".to_string()]
        );
        assert!(store.list_users().await.unwrap().is_empty());
    }
}
