//! Recommendation ranking.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use super::{InteractionMatrix, TruncatedSvd};
use crate::config::RecommendConfig;
use crate::storage::{AccountStore, CatalogStore, LoanStore, SharedDatabase};
use crate::types::{Book, LibraryError, Recommendation, RecommendationSource, Result};

pub struct Recommender {
    db: SharedDatabase,
    max_rank: usize,
}

impl Recommender {
    pub fn new(db: SharedDatabase, config: &RecommendConfig) -> Self {
        Self {
            db,
            max_rank: config.max_rank,
        }
    }

    /// Top `limit` books `username` has never borrowed.
    ///
    /// Scores come from a low-rank reconstruction of the borrow matrix. When
    /// the user has no history, or the matrix is too small to factor, books
    /// are ranked by how often anyone borrowed them instead.
    pub fn recommend(&self, username: &str, limit: usize) -> Result<Vec<Recommendation>> {
        let accounts = AccountStore::new(&self.db);
        if accounts.get_user(username)?.is_none() {
            return Err(LibraryError::not_found("User", username));
        }
        if limit == 0 {
            return Ok(Vec::new());
        }

        let books = CatalogStore::new(&self.db).list_books()?;
        let loans = LoanStore::new(&self.db);
        let pairs = loans.interactions()?;
        let users = accounts
            .list_users()?
            .into_iter()
            .map(|u| u.username)
            .collect();
        let mut book_ids: Vec<i64> = books.iter().map(|b| b.id).collect();
        book_ids.sort_unstable();

        let matrix = InteractionMatrix::build(users, book_ids, &pairs);
        let borrowed: HashSet<i64> = pairs
            .iter()
            .filter(|(user, _)| user == username)
            .map(|(_, book)| *book)
            .collect();
        let catalog: HashMap<i64, &Book> = books.iter().map(|b| (b.id, b)).collect();

        let k = matrix.rank(self.max_rank);
        let row = matrix.user_row(username);
        let (scored, source) = match row {
            Some(row) if k > 0 && matrix.has_interactions(row) => {
                let svd = TruncatedSvd::compute(matrix.data(), k);
                let predicted = svd.reconstruct_row(row);
                debug!(
                    "Factored {}x{} borrow matrix at rank {}",
                    matrix.users().len(),
                    matrix.books().len(),
                    k
                );
                let scored: Vec<(i64, f64)> = matrix
                    .books()
                    .iter()
                    .zip(predicted.iter())
                    .map(|(id, score)| (*id, *score))
                    .collect();
                (scored, RecommendationSource::Collaborative)
            }
            _ => {
                debug!("Falling back to popularity ranking for {}", username);
                let scored = loans
                    .popularity()?
                    .into_iter()
                    .map(|c| (c.book_id, c.borrows as f64))
                    .collect();
                (scored, RecommendationSource::Popularity)
            }
        };

        let picks = rank(scored, &borrowed, limit);
        let recommendations: Vec<Recommendation> = picks
            .into_iter()
            .filter_map(|(book_id, score)| {
                catalog.get(&book_id).map(|book| Recommendation {
                    book_id,
                    title: book.title.clone(),
                    author: book.author.clone(),
                    available: book.available,
                    score,
                    source,
                })
            })
            .collect();

        info!(
            "Recommended {} book(s) for {} ({:?})",
            recommendations.len(),
            username,
            source
        );
        Ok(recommendations)
    }
}

/// Highest score first, ties by ascending book id, skipping `exclude`.
fn rank(mut scored: Vec<(i64, f64)>, exclude: &HashSet<i64>, limit: usize) -> Vec<(i64, f64)> {
    scored.retain(|(id, _)| !exclude.contains(id));
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    scored.truncate(limit);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;
    use std::sync::Arc;

    fn setup() -> SharedDatabase {
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.initialize().unwrap();
        db.execute(
            "INSERT INTO users (username, password_hash) VALUES
             ('alice', 'x'), ('bob', 'x'), ('carol', 'x'), ('dave', 'x')",
            &[],
        )
        .unwrap();
        db.execute(
            "INSERT INTO books (id, title, author, isbn, quantity, available, date_added) VALUES
             (1, 'Dune', 'Frank Herbert', 'i1', 3, 3, '2025-01-01T00:00:00Z'),
             (2, 'Emma', 'Jane Austen', 'i2', 3, 3, '2025-01-01T00:00:00Z'),
             (3, 'Ulysses', 'James Joyce', 'i3', 3, 3, '2025-01-01T00:00:00Z'),
             (4, 'Walden', 'Henry David Thoreau', 'i4', 3, 3, '2025-01-01T00:00:00Z')",
            &[],
        )
        .unwrap();
        db
    }

    fn borrowed(db: &Database, user: &str, book_id: i64) {
        db.execute(
            "INSERT INTO borrowings (book_id, username, borrow_date, due_date, return_date)
             VALUES (?1, ?2, '2025-01-02T00:00:00Z', '2025-01-16T00:00:00Z', '2025-01-05T00:00:00Z')",
            &[&book_id, &user],
        )
        .unwrap();
    }

    fn recommender(db: &SharedDatabase) -> Recommender {
        Recommender::new(db.clone(), &RecommendConfig::default())
    }

    /// Four users and four books factor exactly at the default rank, so the
    /// collaborative case pins the rank to 1.
    fn rank_one(db: &SharedDatabase) -> Recommender {
        let config = RecommendConfig {
            max_rank: 1,
            ..Default::default()
        };
        Recommender::new(db.clone(), &config)
    }

    #[test]
    fn test_collaborative_ranking() {
        let db = setup();
        for book in [1, 2] {
            borrowed(&db, "alice", book);
        }
        for book in [1, 2, 3] {
            borrowed(&db, "bob", book);
        }
        borrowed(&db, "carol", 4);

        let recs = rank_one(&db).recommend("alice", 5).unwrap();
        assert_eq!(recs.len(), 2);
        assert!(recs.iter().all(|r| r.book_id == 3 || r.book_id == 4));
        assert_eq!(recs[0].book_id, 3);
        assert_eq!(recs[0].title, "Ulysses");
        assert_eq!(recs[0].source, RecommendationSource::Collaborative);
        assert!(recs.windows(2).all(|w| w[0].score >= w[1].score));

        assert!(recs[0].score > 0.4);
        assert!(recs[1].score.abs() < 1e-9);

        let top = rank_one(&db).recommend("alice", 1).unwrap();
        assert_eq!(top.len(), 1);
    }

    #[test]
    fn test_new_user_gets_popular_books() {
        let db = setup();
        borrowed(&db, "alice", 2);
        borrowed(&db, "bob", 2);
        borrowed(&db, "bob", 4);

        let recs = recommender(&db).recommend("dave", 3).unwrap();
        let ids: Vec<_> = recs.iter().map(|r| r.book_id).collect();
        assert_eq!(ids, vec![2, 4, 1]);
        assert!(recs.iter().all(|r| r.source == RecommendationSource::Popularity));
        assert_eq!(recs[0].score, 2.0);
    }

    #[test]
    fn test_empty_history_falls_back() {
        let db = setup();
        let recs = recommender(&db).recommend("alice", 10).unwrap();
        assert_eq!(
            recs.iter().map(|r| r.book_id).collect::<Vec<_>>(),
            vec![1, 2, 3, 4]
        );
    }

    #[test]
    fn test_unknown_user_is_an_error() {
        let db = setup();
        assert!(matches!(
            recommender(&db).recommend("mallory", 5),
            Err(LibraryError::NotFound { entity: "User", .. })
        ));
    }

    #[test]
    fn test_everything_borrowed_yields_nothing() {
        let db = setup();
        for book in 1..=4 {
            borrowed(&db, "alice", book);
        }
        borrowed(&db, "bob", 1);
        assert!(recommender(&db).recommend("alice", 5).unwrap().is_empty());
    }

    #[test]
    fn test_rank_orders_and_excludes() {
        let exclude: HashSet<i64> = [2].into_iter().collect();
        let ranked = rank(
            vec![(1, 0.5), (2, 0.9), (3, 0.5), (4, 0.7)],
            &exclude,
            3,
        );
        assert_eq!(ranked, vec![(4, 0.7), (1, 0.5), (3, 0.5)]);
    }
}
