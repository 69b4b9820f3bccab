//! Gradient-based optimisation loop shared by the engines.

use std::marker::PhantomData;
use burn::module::AutodiffModule;
use burn::optim::GradientsParams;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::{ElementConversion, Tensor};
use crate::error::{CoregError, Result};
use crate::optimizer::{AdamOptimizer, Optimizer};
use crate::progress::ProgressTracker;
use crate::validation::{validate_iterations, validate_learning_rate, ConvergenceChecker};

/// Loop controls.
#[derive(Debug, Clone)]
pub struct RegistrationConfig {
    pub iterations: usize,
    pub learning_rate: f64,
    /// Iterations between debug loss logs.
    pub log_interval: usize,
    /// Optional early stop on a loss plateau.
    pub convergence: Option<ConvergenceChecker>,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            iterations: 200,
            learning_rate: 0.1,
            log_interval: 50,
            convergence: None,
        }
    }
}

impl RegistrationConfig {
    pub fn new(iterations: usize, learning_rate: f64) -> Self {
        Self {
            iterations,
            learning_rate,
            ..Self::default()
        }
    }

    pub fn with_log_interval(mut self, log_interval: usize) -> Self {
        self.log_interval = log_interval.max(1);
        self
    }

    pub fn with_convergence(mut self, checker: ConvergenceChecker) -> Self {
        self.convergence = Some(checker);
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_iterations(self.iterations)?;
        validate_learning_rate(self.learning_rate)
    }
}

/// Optimised module and its loss trace.
#[derive(Debug)]
pub struct RegistrationResult<M> {
    pub module: M,
    pub loss_history: Vec<f64>,
}

impl<M> RegistrationResult<M> {
    pub fn final_loss(&self) -> Option<f64> {
        self.loss_history.last().copied()
    }
}

/// Minimises a loss over the parameters of a burn module.
///
/// The loss is supplied per call as a closure of the module, which lets
/// each engine combine its own similarity metric and regularizer.
pub struct Registration<B, M, O = AdamOptimizer<M, B>>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
    O: Optimizer<M, B>,
{
    optimizer: O,
    config: RegistrationConfig,
    tracker: ProgressTracker,
    _phantom: PhantomData<(B, M)>,
}

impl<B, M> Registration<B, M, AdamOptimizer<M, B>>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    /// Adam-driven registration.
    pub fn adam(config: RegistrationConfig) -> Result<Self> {
        config.validate()?;
        let optimizer = AdamOptimizer::new(config.learning_rate);
        Ok(Self::new(optimizer, config))
    }
}

impl<B, M, O> Registration<B, M, O>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
    O: Optimizer<M, B>,
{
    pub fn new(mut optimizer: O, config: RegistrationConfig) -> Self {
        optimizer.set_learning_rate(config.learning_rate);
        Self {
            optimizer,
            config,
            tracker: ProgressTracker::default(),
            _phantom: PhantomData,
        }
    }

    pub fn with_tracker(mut self, tracker: ProgressTracker) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn config(&self) -> &RegistrationConfig {
        &self.config
    }

    /// Run the configured number of Adam steps on `module`.
    ///
    /// Fails with [`CoregError::NumericalInstability`] as soon as the loss
    /// is not finite.
    pub fn execute<F>(&mut self, mut module: M, loss_fn: F) -> Result<RegistrationResult<M>>
    where
        F: Fn(&M) -> Tensor<B, 1>,
    {
        let iterations = self.config.iterations;
        let mut loss_history = Vec::with_capacity(iterations);
        self.tracker.start();

        for i in 0..iterations {
            let loss = loss_fn(&module);
            let value = loss.clone().into_scalar().elem::<f64>();
            if !value.is_finite() {
                let msg = format!("loss became {} at iteration {}", value, i);
                self.tracker.error(&msg);
                return Err(CoregError::numerical_instability(msg));
            }
            loss_history.push(value);

            if i % self.config.log_interval == 0 {
                tracing::debug!("Iteration {}: Loss {:.6}", i, value);
            }
            self.tracker.update(i + 1, Some(iterations), value);

            let grads = loss.backward();
            let grads_params = GradientsParams::from_grads(grads, &module);
            module = self.optimizer.step(module, grads_params);

            if let Some(checker) = &self.config.convergence {
                if checker.check_convergence(&loss_history) {
                    tracing::debug!("Loss plateau after {} iterations", i + 1);
                    break;
                }
            }
        }

        let final_value = loss_history.last().copied().unwrap_or(f64::NAN);
        self.tracker.complete(loss_history.len(), final_value);
        Ok(RegistrationResult { module, loss_history })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::Autodiff;
    use burn::module::{Module, Param};
    use burn::tensor::backend::Backend;
    use burn_ndarray::NdArray;

    type B = Autodiff<NdArray<f32>>;

    #[derive(Module, Debug)]
    struct Offset<B: Backend> {
        value: Param<Tensor<B, 1>>,
    }

    #[test]
    fn test_adam_minimises_quadratic() {
        let device = Default::default();
        let module = Offset::<B> {
            value: Param::from_tensor(Tensor::zeros([1], &device)),
        };
        let target = Tensor::<B, 1>::from_floats([3.0], &device);
        let mut registration = Registration::adam(RegistrationConfig::new(300, 0.1)).unwrap();
        let result = registration
            .execute(module, |m| (m.value.val() - target.clone()).powf_scalar(2.0).sum())
            .unwrap();

        let history = &result.loss_history;
        assert_eq!(history.len(), 300);
        assert!(history[299] < history[0]);
        let value: f32 = result.module.value.val().into_scalar();
        assert!((value - 3.0).abs() < 0.1);
    }

    #[test]
    fn test_non_finite_loss_is_an_error() {
        let device = Default::default();
        let module = Offset::<B> {
            value: Param::from_tensor(Tensor::zeros([1], &device)),
        };
        let mut registration = Registration::adam(RegistrationConfig::new(5, 0.1)).unwrap();
        let result = registration.execute(module, |m| m.value.val().sum().log());
        assert!(matches!(result, Err(CoregError::NumericalInstability(_))));
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(Registration::<B, Offset<B>>::adam(RegistrationConfig::new(0, 0.1)).is_err());
        assert!(Registration::<B, Offset<B>>::adam(RegistrationConfig::new(10, -1.0)).is_err());
    }
}
