//! Affine expressions over decision variables and matrices of them.
//!
//! Every quantity in a model other than the decision variables themselves is an affine function
//! of the variables: a sum of `coefficient * variable` terms plus a constant. [`LinExpr`]
//! represents such a function and [`Constraint`] relates one to zero.
use derive_more::Display;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

/// Tolerance used when checking whether a constraint without variables is satisfied
const TRIVIAL_TOLERANCE: f64 = 1e-9;

/// Refers to a column of the optimisation problem
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display("x{_0}")]
pub struct VarId(usize);

impl VarId {
    /// Create a [`VarId`] for the column at `index`
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    /// The position of the column in the problem
    pub fn index(self) -> usize {
        self.0
    }
}

/// An affine expression: `sum(coefficient * variable) + constant`.
///
/// Terms for the same variable may appear more than once until [`LinExpr::simplify`] is called.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LinExpr {
    terms: Vec<(VarId, f64)>,
    constant: f64,
}

impl LinExpr {
    /// The zero expression
    pub fn zero() -> Self {
        Self::default()
    }

    /// An expression with no variables
    pub fn constant(value: f64) -> Self {
        Self {
            terms: Vec::new(),
            constant: value,
        }
    }

    /// A single variable with a coefficient of one
    pub fn var(var: VarId) -> Self {
        Self::term(var, 1.0)
    }

    /// A single variable with the given coefficient
    pub fn term(var: VarId, coeff: f64) -> Self {
        Self {
            terms: vec![(var, coeff)],
            constant: 0.0,
        }
    }

    /// Add `coeff * var` to the expression
    pub fn add_term(&mut self, var: VarId, coeff: f64) {
        if coeff != 0.0 {
            self.terms.push((var, coeff));
        }
    }

    /// Add `factor * other` to the expression
    pub fn add_scaled(&mut self, other: &LinExpr, factor: f64) {
        if factor == 0.0 {
            return;
        }

        self.terms.extend(
            other
                .terms
                .iter()
                .map(|(var, coeff)| (*var, coeff * factor)),
        );
        self.constant += other.constant * factor;
    }

    /// Add a constant to the expression
    pub fn add_constant(&mut self, value: f64) {
        self.constant += value;
    }

    /// The variable terms
    pub fn terms(&self) -> &[(VarId, f64)] {
        &self.terms
    }

    /// The constant part
    pub fn constant_part(&self) -> f64 {
        self.constant
    }

    /// Whether the expression has no variable terms
    pub fn is_constant(&self) -> bool {
        self.terms.is_empty()
    }

    /// Merge terms for the same variable and drop zero coefficients.
    ///
    /// Terms are ordered by variable.
    pub fn simplify(mut self) -> Self {
        self.terms.sort_by_key(|(var, _)| *var);

        let mut merged: Vec<(VarId, f64)> = Vec::with_capacity(self.terms.len());
        for (var, coeff) in self.terms {
            match merged.last_mut() {
                Some((last, total)) if *last == var => *total += coeff,
                _ => merged.push((var, coeff)),
            }
        }
        merged.retain(|(_, coeff)| *coeff != 0.0);

        Self {
            terms: merged,
            constant: self.constant,
        }
    }

    /// Evaluate the expression given a value for every variable
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|(var, coeff)| coeff * values[var.index()])
            .sum::<f64>()
            + self.constant
    }

    /// `self <= rhs`
    pub fn leq<T: Into<LinExpr>>(self, rhs: T) -> Constraint {
        Constraint::new(self - rhs.into(), Relation::LessEq)
    }

    /// `self >= rhs`
    pub fn geq<T: Into<LinExpr>>(self, rhs: T) -> Constraint {
        Constraint::new(self - rhs.into(), Relation::GreaterEq)
    }

    /// `self == rhs`
    pub fn equals<T: Into<LinExpr>>(self, rhs: T) -> Constraint {
        Constraint::new(self - rhs.into(), Relation::Equal)
    }
}

impl From<f64> for LinExpr {
    fn from(value: f64) -> Self {
        Self::constant(value)
    }
}

impl From<VarId> for LinExpr {
    fn from(var: VarId) -> Self {
        Self::var(var)
    }
}

impl AddAssign<&LinExpr> for LinExpr {
    fn add_assign(&mut self, rhs: &LinExpr) {
        self.add_scaled(rhs, 1.0);
    }
}

impl AddAssign<LinExpr> for LinExpr {
    fn add_assign(&mut self, rhs: LinExpr) {
        self.terms.extend(rhs.terms);
        self.constant += rhs.constant;
    }
}

impl SubAssign<&LinExpr> for LinExpr {
    fn sub_assign(&mut self, rhs: &LinExpr) {
        self.add_scaled(rhs, -1.0);
    }
}

impl Add for LinExpr {
    type Output = LinExpr;

    fn add(mut self, rhs: LinExpr) -> LinExpr {
        self += rhs;
        self
    }
}

impl Add<&LinExpr> for LinExpr {
    type Output = LinExpr;

    fn add(mut self, rhs: &LinExpr) -> LinExpr {
        self += rhs;
        self
    }
}

impl Sub for LinExpr {
    type Output = LinExpr;

    fn sub(mut self, rhs: LinExpr) -> LinExpr {
        self -= &rhs;
        self
    }
}

impl Sub<&LinExpr> for LinExpr {
    type Output = LinExpr;

    fn sub(mut self, rhs: &LinExpr) -> LinExpr {
        self -= rhs;
        self
    }
}

impl Neg for LinExpr {
    type Output = LinExpr;

    fn neg(self) -> LinExpr {
        self * -1.0
    }
}

impl Mul<f64> for LinExpr {
    type Output = LinExpr;

    fn mul(mut self, rhs: f64) -> LinExpr {
        for (_, coeff) in &mut self.terms {
            *coeff *= rhs;
        }
        self.constant *= rhs;
        self
    }
}

impl Mul<f64> for &LinExpr {
    type Output = LinExpr;

    fn mul(self, rhs: f64) -> LinExpr {
        let mut expr = LinExpr::zero();
        expr.add_scaled(self, rhs);
        expr
    }
}

impl Sum for LinExpr {
    fn sum<I: Iterator<Item = LinExpr>>(iter: I) -> Self {
        iter.fold(LinExpr::zero(), |acc, expr| acc + expr)
    }
}

impl<'a> Sum<&'a LinExpr> for LinExpr {
    fn sum<I: Iterator<Item = &'a LinExpr>>(iter: I) -> Self {
        iter.fold(LinExpr::zero(), |acc, expr| acc + expr)
    }
}

/// How a constraint's expression relates to zero
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Relation {
    /// `expr <= 0`
    LessEq,
    /// `expr >= 0`
    GreaterEq,
    /// `expr == 0`
    Equal,
}

/// A linear constraint of the form `expr (<=|>=|==) 0`
#[derive(Clone, Debug, PartialEq)]
pub struct Constraint {
    expr: LinExpr,
    relation: Relation,
}

impl Constraint {
    /// Create a new constraint, merging duplicate terms
    pub fn new(expr: LinExpr, relation: Relation) -> Self {
        Self {
            expr: expr.simplify(),
            relation,
        }
    }

    /// The constraint's expression
    pub fn expr(&self) -> &LinExpr {
        &self.expr
    }

    /// How the expression relates to zero
    pub fn relation(&self) -> Relation {
        self.relation
    }

    /// The bounds on the variable terms, once the constant is moved to the right-hand side
    pub fn row_bounds(&self) -> (f64, f64) {
        let rhs = -self.expr.constant;
        match self.relation {
            Relation::LessEq => (f64::NEG_INFINITY, rhs),
            Relation::GreaterEq => (rhs, f64::INFINITY),
            Relation::Equal => (rhs, rhs),
        }
    }

    /// For a constraint with no variable terms, whether it is satisfied
    pub fn trivially_satisfied(&self) -> Option<bool> {
        if !self.expr.is_constant() {
            return None;
        }

        let value = self.expr.constant;
        Some(match self.relation {
            Relation::LessEq => value <= TRIVIAL_TOLERANCE,
            Relation::GreaterEq => value >= -TRIVIAL_TOLERANCE,
            Relation::Equal => value.abs() <= TRIVIAL_TOLERANCE,
        })
    }

    /// How far a solution is from satisfying the constraint (zero if satisfied)
    pub fn violation(&self, values: &[f64]) -> f64 {
        let value = self.expr.evaluate(values);
        match self.relation {
            Relation::LessEq => value.max(0.0),
            Relation::GreaterEq => (-value).max(0.0),
            Relation::Equal => value.abs(),
        }
    }
}

/// A dense matrix of expressions, stored row by row
#[derive(Clone, Debug, PartialEq)]
pub struct ExprMatrix {
    rows: usize,
    cols: usize,
    data: Vec<LinExpr>,
}

impl ExprMatrix {
    /// A matrix of zero expressions
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![LinExpr::zero(); rows * cols],
        }
    }

    /// Build a matrix by calling `f(row, col)` for every entry
    pub fn from_fn<F>(rows: usize, cols: usize, mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> LinExpr,
    {
        let mut data = Vec::with_capacity(rows * cols);
        for row in 0..rows {
            for col in 0..cols {
                data.push(f(row, col));
            }
        }

        Self { rows, cols, data }
    }

    /// A matrix of constants where entry `(row, col)` is `columns[col][row]`
    pub fn from_columns(rows: usize, columns: &[Vec<f64>]) -> Self {
        Self::from_fn(rows, columns.len(), |row, col| {
            LinExpr::constant(columns[col][row])
        })
    }

    /// The number of rows
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// The number of columns
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Multiply entry `(row, col)` by `factors[col][row]`
    pub fn scale_columns(&self, factors: &[Vec<f64>]) -> Self {
        assert_eq!(factors.len(), self.cols, "One factor column per column needed");
        Self::from_fn(self.rows, self.cols, |row, col| {
            self.get(row, col) * factors[col][row]
        })
    }

    /// Combine two matrices of the same shape entry by entry
    pub fn zip_with<F>(&self, other: &ExprMatrix, mut f: F) -> Self
    where
        F: FnMut(&LinExpr, &LinExpr) -> LinExpr,
    {
        assert_eq!(
            (self.rows, self.cols),
            (other.rows, other.cols),
            "Matrices have different shapes"
        );
        Self::from_fn(self.rows, self.cols, |row, col| {
            f(self.get(row, col), other.get(row, col))
        })
    }

    /// The entry-wise sum of two matrices of the same shape
    pub fn plus(&self, other: &ExprMatrix) -> Self {
        self.zip_with(other, |a, b| a.clone() + b)
    }

    /// The entry-wise difference of two matrices of the same shape
    pub fn minus(&self, other: &ExprMatrix) -> Self {
        self.zip_with(other, |a, b| a.clone() - b)
    }

    /// Iterate over every entry, row by row
    pub fn iter(&self) -> impl Iterator<Item = &LinExpr> {
        self.data.iter()
    }

    /// Get an entry
    pub fn get(&self, row: usize, col: usize) -> &LinExpr {
        assert!(row < self.rows && col < self.cols, "Index out of range");
        &self.data[row * self.cols + col]
    }

    /// Get a mutable reference to an entry
    pub fn get_mut(&mut self, row: usize, col: usize) -> &mut LinExpr {
        assert!(row < self.rows && col < self.cols, "Index out of range");
        &mut self.data[row * self.cols + col]
    }

    /// Iterate over the entries of a column
    pub fn column(&self, col: usize) -> impl Iterator<Item = &LinExpr> {
        (0..self.rows).map(move |row| self.get(row, col))
    }

    /// Sum consecutive blocks of `block_size` rows.
    ///
    /// Used to aggregate per-time-step quantities to annual totals.
    pub fn sum_row_blocks(&self, block_size: usize) -> Self {
        assert!(
            block_size > 0 && self.rows % block_size == 0,
            "Rows cannot be split into blocks of size {block_size}"
        );

        Self::from_fn(self.rows / block_size, self.cols, |block, col| {
            (block * block_size..(block + 1) * block_size)
                .map(|row| self.get(row, col))
                .sum()
        })
    }

    /// The sum of every entry in each row, as a one-column matrix
    pub fn sum_columns(&self) -> Self {
        Self::from_fn(self.rows, 1, |row, _| {
            (0..self.cols).map(|col| self.get(row, col)).sum()
        })
    }

    /// The sum of every entry
    pub fn total(&self) -> LinExpr {
        self.data.iter().sum()
    }

    /// Evaluate every entry given a value for every variable
    pub fn evaluate(&self, values: &[f64]) -> ValueMatrix {
        ValueMatrix {
            rows: self.rows,
            cols: self.cols,
            values: self.data.iter().map(|expr| expr.evaluate(values)).collect(),
        }
    }
}

/// A dense matrix of numbers, stored row by row
#[derive(Clone, Debug, PartialEq)]
pub struct ValueMatrix {
    rows: usize,
    cols: usize,
    values: Vec<f64>,
}

impl ValueMatrix {
    /// The number of rows
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// The number of columns
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Get an entry
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.cols + col]
    }

    /// The entries of a row
    pub fn row(&self, row: usize) -> &[f64] {
        &self.values[row * self.cols..(row + 1) * self.cols]
    }

    /// The entries of a column
    pub fn column(&self, col: usize) -> Vec<f64> {
        (0..self.rows).map(|row| self.get(row, col)).collect()
    }

    /// The matrix as a vector of rows
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        (0..self.rows).map(|row| self.row(row).to_vec()).collect()
    }
}
