//! User × book interaction matrix.

use std::collections::HashMap;

use ndarray::{Array2, ArrayView1};

/// Binary borrow matrix: `data[[u, b]] == 1.0` when user `u` ever borrowed
/// book `b`. Rows follow `users`, columns follow `books`.
#[derive(Debug, Clone)]
pub struct InteractionMatrix {
    users: Vec<String>,
    books: Vec<i64>,
    user_index: HashMap<String, usize>,
    data: Array2<f64>,
}

impl InteractionMatrix {
    /// Build the matrix over every user and every book. Pairs that mention an
    /// unknown user or book are ignored.
    pub fn build(users: Vec<String>, books: Vec<i64>, pairs: &[(String, i64)]) -> Self {
        let user_index: HashMap<String, usize> = users
            .iter()
            .enumerate()
            .map(|(i, u)| (u.clone(), i))
            .collect();
        let book_index: HashMap<i64, usize> =
            books.iter().enumerate().map(|(i, b)| (*b, i)).collect();

        let mut data = Array2::<f64>::zeros((users.len(), books.len()));
        for (user, book) in pairs {
            if let (Some(&u), Some(&b)) = (user_index.get(user), book_index.get(book)) {
                data[[u, b]] = 1.0;
            }
        }

        Self {
            users,
            books,
            user_index,
            data,
        }
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn books(&self) -> &[i64] {
        &self.books
    }

    pub fn users(&self) -> &[String] {
        &self.users
    }

    pub fn user_row(&self, username: &str) -> Option<usize> {
        self.user_index.get(username).copied()
    }

    pub fn row(&self, user: usize) -> ArrayView1<'_, f64> {
        self.data.row(user)
    }

    pub fn has_interactions(&self, user: usize) -> bool {
        self.data.row(user).iter().any(|v| *v > 0.0)
    }

    /// Factorization rank: `min(max_rank, min(rows, cols) - 1)`, zero for an
    /// empty or single-row/column matrix.
    pub fn rank(&self, max_rank: usize) -> usize {
        let (rows, cols) = self.data.dim();
        rows.min(cols).saturating_sub(1).min(max_rank)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> InteractionMatrix {
        InteractionMatrix::build(
            vec!["alice".into(), "bob".into(), "carol".into()],
            vec![10, 20, 30],
            &[
                ("alice".into(), 10),
                ("bob".into(), 20),
                ("bob".into(), 30),
                ("dave".into(), 10),
                ("alice".into(), 99),
            ],
        )
    }

    #[test]
    fn test_build_marks_known_pairs_only() {
        let m = sample();
        assert_eq!(m.data().dim(), (3, 3));
        assert_eq!(m.data().sum(), 3.0);

        let bob = m.user_row("bob").unwrap();
        assert_eq!(m.row(bob).to_vec(), vec![0.0, 1.0, 1.0]);
        assert_eq!(m.books()[2], 30);
        assert_eq!(m.user_row("dave"), None);
    }

    #[test]
    fn test_has_interactions() {
        let m = sample();
        assert!(m.has_interactions(m.user_row("alice").unwrap()));
        assert!(!m.has_interactions(m.user_row("carol").unwrap()));
    }

    #[test]
    fn test_rank_is_bounded() {
        let m = sample();
        assert_eq!(m.rank(50), 2);
        assert_eq!(m.rank(1), 1);

        let single = InteractionMatrix::build(vec!["alice".into()], vec![1, 2, 3], &[]);
        assert_eq!(single.rank(50), 0);

        let empty = InteractionMatrix::build(vec![], vec![], &[]);
        assert_eq!(empty.rank(50), 0);
    }
}
