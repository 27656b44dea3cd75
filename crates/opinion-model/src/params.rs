//! Parameter Store
//!
//! Owns every trainable variable of a model. Initial values are drawn from a
//! seeded `SmallRng` on the host, so two stores built with the same seed and
//! the same sequence of requests hold identical weights on any device.

use candle_core::{Device, Tensor, Var};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use crate::error::ModelResult;

pub struct ParamStore {
    device: Device,
    rng: SmallRng,
    vars: Vec<(String, Var)>,
}

impl ParamStore {
    pub fn new(seed: u64, device: &Device) -> Self {
        Self {
            device: device.clone(),
            rng: SmallRng::seed_from_u64(seed),
            vars: Vec::new(),
        }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Registers a variable drawn from U(-bound, bound).
    pub fn uniform(&mut self, name: &str, shape: &[usize], bound: f64) -> ModelResult<Tensor> {
        let bound = bound as f32;
        let data = (0..shape.iter().product::<usize>())
            .map(|_| self.rng.gen_range(-bound..=bound))
            .collect();
        self.register(name, data, shape)
    }

    /// Registers a variable drawn from N(0, std²).
    pub fn normal(&mut self, name: &str, shape: &[usize], std: f64) -> ModelResult<Tensor> {
        let std = std as f32;
        let data = (0..shape.iter().product::<usize>())
            .map(|_| self.rng.sample::<f32, _>(StandardNormal) * std)
            .collect();
        self.register(name, data, shape)
    }

    /// Registers a variable with every element set to `value`.
    pub fn constant(&mut self, name: &str, shape: &[usize], value: f32) -> ModelResult<Tensor> {
        let data = vec![value; shape.iter().product::<usize>()];
        self.register(name, data, shape)
    }

    fn register(&mut self, name: &str, data: Vec<f32>, shape: &[usize]) -> ModelResult<Tensor> {
        let tensor = Tensor::from_vec(data, shape, &self.device)?;
        let var = Var::from_tensor(&tensor)?;
        let handle = var.as_tensor().clone();
        self.vars.push((name.to_string(), var));
        Ok(handle)
    }

    /// All trainable variables, in registration order.
    pub fn vars(&self) -> Vec<Var> {
        self.vars.iter().map(|(_, var)| var.clone()).collect()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.vars.iter().map(|(name, _)| name.as_str())
    }

    /// Looks up a variable's current value by name.
    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.vars
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, var)| var.as_tensor())
    }

    /// Total number of scalar parameters.
    pub fn num_params(&self) -> usize {
        self.vars.iter().map(|(_, var)| var.elem_count()).sum()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl std::fmt::Debug for ParamStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParamStore")
            .field("device", &self.device)
            .field("tensors", &self.vars.len())
            .field("params", &self.num_params())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_weights() {
        let mut a = ParamStore::new(7, &Device::Cpu);
        let mut b = ParamStore::new(7, &Device::Cpu);

        let wa = a.uniform("w", &[4, 3], 0.5).unwrap();
        let wb = b.uniform("w", &[4, 3], 0.5).unwrap();

        assert_eq!(
            wa.to_vec2::<f32>().unwrap(),
            wb.to_vec2::<f32>().unwrap()
        );
    }

    #[test]
    fn test_uniform_within_bound() {
        let mut store = ParamStore::new(1, &Device::Cpu);
        let w = store.uniform("w", &[16, 16], 0.25).unwrap();

        for v in w.flatten_all().unwrap().to_vec1::<f32>().unwrap() {
            assert!((-0.25..=0.25).contains(&v));
        }
    }

    #[test]
    fn test_bookkeeping() {
        let mut store = ParamStore::new(1, &Device::Cpu);
        store.normal("emb", &[10, 4], 1.0).unwrap();
        store.constant("ln.weight", &[4], 1.0).unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.num_params(), 44);
        assert_eq!(store.names().collect::<Vec<_>>(), vec!["emb", "ln.weight"]);
        assert_eq!(
            store.get("ln.weight").unwrap().to_vec1::<f32>().unwrap(),
            vec![1.0; 4]
        );
        assert!(store.get("missing").is_none());
    }
}
