use chrono::Utc;
use uuid::Uuid;

use records_cell::models::Rating;
use records_cell::services::rating::average_score;

fn rating(score: i32) -> Rating {
    Rating {
        id: Uuid::new_v4(),
        consultation_id: Uuid::new_v4(),
        patient_id: Uuid::new_v4(),
        doctor_id: Uuid::new_v4(),
        score,
        comment: None,
        created_at: Utc::now(),
    }
}

#[test]
fn test_average_of_no_ratings_is_zero() {
    assert_eq!(average_score(&[]), 0.0);
}

#[test]
fn test_average_of_single_rating() {
    assert_eq!(average_score(&[rating(4)]), 4.0);
}

#[test]
fn test_average_is_fractional() {
    let ratings = vec![rating(5), rating(4)];
    assert_eq!(average_score(&ratings), 4.5);
}
