use std::path::Path;

use tempfile::TempDir;

const CITIES: [&str; 6] = [
    "San Jose",
    "Beulah",
    "Santa Fe",
    "Bettendorf",
    "San Diego",
    "Harwood",
];

/// Write users, cards and transactions CSV files shaped like the Kaggle dataset
pub fn write_dataset(
    dir: &Path,
    num_users: usize,
    cards_per_user: usize,
    num_transactions: usize,
) -> csv::Result<()> {
    let mut users = csv::Writer::from_path(dir.join("users_data.csv"))?;
    users.write_record([
        "id",
        "current_age",
        "retirement_age",
        "birth_year",
        "birth_month",
        "gender",
        "address",
        "latitude",
        "longitude",
        "per_capita_income",
    ])?;
    for i in 0..num_users {
        users.write_record([
            i.to_string(),
            (20 + i % 60).to_string(),
            "67".to_string(),
            (1940 + i % 60).to_string(),
            (1 + i % 12).to_string(),
            if i % 2 == 0 { "Female" } else { "Male" }.to_string(),
            format!("{} Main Street", i + 1),
            format!("{:.2}", 30.0 + (i % 15) as f64),
            format!("{:.2}", -120.0 + (i % 40) as f64),
            format!("${}", 20_000 + (i % 50) * 1_000),
        ])?;
    }
    users.flush()?;

    let mut cards = csv::Writer::from_path(dir.join("cards_data.csv"))?;
    cards.write_record([
        "id",
        "client_id",
        "card_brand",
        "card_type",
        "card_number",
        "expires",
        "cvv",
        "has_chip",
        "num_cards_issued",
        "credit_limit",
    ])?;
    for i in 0..num_users * cards_per_user {
        cards.write_record([
            i.to_string(),
            (i / cards_per_user.max(1)).to_string(),
            if i % 3 == 0 { "Mastercard" } else { "Visa" }.to_string(),
            "Debit".to_string(),
            format!("4{:015}", i),
            "12/2026".to_string(),
            format!("{:03}", i % 1000),
            if i % 4 == 0 { "NO" } else { "YES" }.to_string(),
            (1 + i % 3).to_string(),
            format!("${}", 5_000 + (i % 20) * 1_000),
        ])?;
    }
    cards.flush()?;

    let mut transactions = csv::Writer::from_path(dir.join("transactions_data.csv"))?;
    transactions.write_record([
        "id",
        "date",
        "client_id",
        "card_id",
        "amount",
        "use_chip",
        "merchant_id",
        "merchant_city",
        "merchant_state",
        "zip",
        "mcc",
    ])?;
    for i in 0..num_transactions {
        transactions.write_record([
            (7_475_327 + i).to_string(),
            format!("2010-01-{:02} {:02}:{:02}:00", 1 + i % 28, i % 24, i % 60),
            (i % num_users.max(1)).to_string(),
            (i % (num_users * cards_per_user).max(1)).to_string(),
            format!("${}.{:02}", i % 1_200, i % 100),
            if i % 5 == 0 { "Chip Transaction" } else { "Swipe Transaction" }.to_string(),
            (10_000 + i % 5_000).to_string(),
            CITIES[i % CITIES.len()].to_string(),
            "CA".to_string(),
            format!("{}.0", 90_000 + i % 1_000),
            "5411".to_string(),
        ])?;
    }
    transactions.flush()?;

    Ok(())
}

/// Generate a dataset in a fresh temporary directory
pub fn generate_dataset(
    num_users: usize,
    cards_per_user: usize,
    num_transactions: usize,
) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path(), num_users, cards_per_user, num_transactions).unwrap();
    dir
}
