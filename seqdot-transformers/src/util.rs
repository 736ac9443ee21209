use tch::{TchError, Tensor};

/// Numerically stable log-sum-exp.
pub trait LogSumExp {
    /// Compute *log ∑ exp(x)* along `dim`, removing `dim`.
    ///
    /// The maximum along `dim` is subtracted before exponentiation and
    /// added back afterwards, so that large scores do not overflow.
    fn log_sum_exp(&self, dim: i64) -> Result<Tensor, TchError>;
}

impl LogSumExp for Tensor {
    fn log_sum_exp(&self, dim: i64) -> Result<Tensor, TchError> {
        let (max, _) = self.f_max_dim(dim, true)?;

        // A slice consisting of only -inf would result in NaN after
        // subtracting the maximum.
        let max = max.f_where_self(&max.f_isfinite()?, &max.f_zeros_like()?)?;

        self.f_sub(&max)?
            .f_exp()?
            .f_sum_dim_intlist(&[dim][..], true, self.kind())?
            .f_log()?
            .f_add(&max)?
            .f_squeeze_dim(dim)
    }
}
