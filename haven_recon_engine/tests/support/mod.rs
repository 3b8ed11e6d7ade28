use haven_recon_engine::{
    db_types::{NewTransaction, Provider, RelatedObject, TransactionType},
    traits::ReconciliationDatabase,
    SqliteDatabase,
};
use hps_common::Money;
use log::*;

pub async fn prepare_test_db() -> SqliteDatabase {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    let url = random_db_url();
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database");
    db.migrate().await.expect("Error running DB migrations");
    info!("🚀️ Test database ready at {url}");
    db
}

pub fn random_db_url() -> String {
    let dir = std::env::temp_dir().join(format!("haven_recon_test_{}.db", rand::random::<u64>()));
    format!("sqlite://{}", dir.display())
}

pub async fn seed_pending_transaction(
    db: &SqliteDatabase,
    provider: Provider,
    provider_txn_id: Option<&str>,
    txn_type: TransactionType,
    related: RelatedObject,
) -> i64 {
    let mut txn = NewTransaction::new(txn_type, Money::from_units(500), "USD", provider)
        .for_user("user_1")
        .with_related_object(related);
    if let Some(id) = provider_txn_id {
        txn = txn.with_provider_txn_id(id);
    }
    let created = db.create_transaction(txn).await.expect("Error creating transaction");
    created.id
}

pub async fn seed_referral_commission(db: &SqliteDatabase, referral_id: &str, transaction_id: i64) {
    sqlx::query(
        "INSERT INTO referral_commissions (referral_id, transaction_id, commission_amount) VALUES ($1, $2, $3)",
    )
    .bind(referral_id)
    .bind(transaction_id)
    .bind(2_500i64)
    .execute(db.pool())
    .await
    .expect("Error seeding referral commission");
}
