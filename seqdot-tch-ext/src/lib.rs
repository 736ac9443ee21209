//! Variable store paths with parameter groups.
//!
//! Sequence labelers usually want different optimizer settings for
//! different parts of the model. For instance, the CRF transition
//! matrix is often trained with a larger learning rate than the
//! emission projection. `PathExt` wraps a `tch` path and assigns every
//! variable to a parameter group, using a function of the variable's
//! full name.

use std::ops::Div;
use std::rc::Rc;

use itertools::Itertools;
use tch::nn::{Init, Path, VarStore};
use tch::{Device, TchError, Tensor};

/// Trait that provides the root of a variable store.
pub trait RootExt {
    /// Get the root of a variable store.
    ///
    /// In contrast to the regular `root` method, `root_ext` takes a
    /// function that maps a full variable name (components separated
    /// by `.`) to a parameter group.
    fn root_ext<F>(&self, parameter_group_fun: F) -> PathExt
    where
        F: 'static + Fn(&str) -> usize;
}

impl RootExt for VarStore {
    fn root_ext<F>(&self, parameter_group_fun: F) -> PathExt
    where
        F: 'static + Fn(&str) -> usize,
    {
        PathExt {
            inner: self.root(),
            parameter_group_fun: Rc::new(parameter_group_fun),
        }
    }
}

/// A variable store path that assigns variables to parameter groups.
pub struct PathExt<'a> {
    inner: Path<'a>,
    parameter_group_fun: Rc<dyn Fn(&str) -> usize>,
}

impl<'a> PathExt<'a> {
    /// The device on which variables of this path are allocated.
    pub fn device(&self) -> Device {
        self.inner.device()
    }

    /// Get a sub-path of the current path.
    pub fn sub<T: ToString>(&'a self, s: T) -> PathExt<'a> {
        PathExt {
            inner: self.inner.sub(s),
            parameter_group_fun: self.parameter_group_fun.clone(),
        }
    }

    /// Create a tensor variable initialized with the given initializer.
    pub fn var(&self, name: &str, dims: &[i64], init: Init) -> Result<Tensor, TchError> {
        self.grouped_path(name).f_var(name, dims, init)
    }

    /// Create a tensor variable initialized with the values from another tensor.
    pub fn var_copy(&self, name: &str, t: &Tensor) -> Result<Tensor, TchError> {
        self.grouped_path(name).f_var_copy(name, t)
    }

    /// Create a tensor variable initialized with zeros.
    pub fn zeros(&self, name: &str, dims: &[i64]) -> Result<Tensor, TchError> {
        self.var(name, dims, Init::Const(0.))
    }

    /// Get the full name of `name` within this path.
    pub fn full_name(&self, name: &str) -> String {
        let components = self.inner.components().join(".");
        if components.is_empty() {
            name.to_owned()
        } else {
            format!("{}.{}", components, name)
        }
    }

    /// Get the parameter group of the variable `name`.
    pub fn parameter_group(&self, name: &str) -> usize {
        (self.parameter_group_fun)(&self.full_name(name))
    }

    fn grouped_path(&self, name: &str) -> Path<'a> {
        self.inner.set_group(self.parameter_group(name))
    }
}

impl<'a, T> Div<T> for &'a PathExt<'a>
where
    T: std::string::ToString,
{
    type Output = PathExt<'a>;

    fn div(self, rhs: T) -> Self::Output {
        self.sub(rhs.to_string())
    }
}
