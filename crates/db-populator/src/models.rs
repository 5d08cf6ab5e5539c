//! Row types written by the load generator and the weighted operation mix.

use crate::error::PopulatorError;
use crate::fake;
use chrono::{Local, NaiveDateTime};
use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::seq::IndexedRandom;
use rand::Rng;
use rust_decimal::Decimal;
use std::fmt;

/// A customer about to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCustomer {
    pub name: String,
    pub email: String,
    pub created_at: NaiveDateTime,
}

impl NewCustomer {
    /// Synthesize a customer stamped with the current local time.
    pub fn generate<R: Rng>(rng: &mut R) -> Self {
        Self {
            name: fake::person_name(rng),
            email: fake::email(rng),
            created_at: Local::now().naive_local(),
        }
    }
}

/// A product about to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub name: String,
    pub price: Decimal,
    pub stock: i32,
}

impl NewProduct {
    /// Synthesize a product with a random price and stock level.
    pub fn generate<R: Rng>(rng: &mut R) -> Self {
        Self {
            name: fake::product_name(rng),
            price: fake::price(rng),
            stock: fake::stock(rng),
        }
    }
}

/// A stored product's identifier and unit price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductPrice {
    pub id: i32,
    pub price: Decimal,
}

/// An order about to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub customer_id: i32,
    pub product_id: i32,
    pub quantity: i32,
    pub total: Decimal,
    pub ordered_at: NaiveDateTime,
}

impl NewOrder {
    /// Synthesize an order for the given customer and product with a random quantity.
    pub fn generate<R: Rng>(rng: &mut R, customer_id: i32, product: ProductPrice) -> Self {
        let quantity = fake::quantity(rng);
        Self {
            customer_id,
            product_id: product.id,
            quantity,
            total: order_total(product.price, quantity),
            ordered_at: Local::now().naive_local(),
        }
    }

    /// Synthesize an order by sampling a customer and a product uniformly (with replacement).
    pub fn sample<R: Rng>(
        rng: &mut R,
        customer_ids: &[i32],
        products: &[ProductPrice],
    ) -> Result<Self, PopulatorError> {
        let customer_id = *customer_ids
            .choose(rng)
            .ok_or(PopulatorError::EmptySample("customer"))?;
        let product = *products
            .choose(rng)
            .ok_or(PopulatorError::EmptySample("product"))?;
        Ok(Self::generate(rng, customer_id, product))
    }
}

/// `round(price * quantity, 2)`.
pub fn order_total(price: Decimal, quantity: i32) -> Decimal {
    (price * Decimal::from(quantity)).round_dp(2)
}

/// A stock overwrite for one product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockUpdate {
    pub product_id: i32,
    pub stock: i32,
}

impl StockUpdate {
    /// Pick one of `product_ids` uniformly and assign it a fresh stock level.
    pub fn sample<R: Rng>(rng: &mut R, product_ids: &[i32]) -> Result<Self, PopulatorError> {
        let product_id = *product_ids
            .choose(rng)
            .ok_or(PopulatorError::EmptySample("product"))?;
        Ok(Self {
            product_id,
            stock: fake::stock(rng),
        })
    }
}

/// One kind of write performed per simulation iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    NewCustomer,
    NewProduct,
    NewOrder,
    UpdateStock,
}

impl Operation {
    /// Every operation, in the order used for sampling.
    pub const ALL: [Operation; 4] = [
        Operation::NewCustomer,
        Operation::NewProduct,
        Operation::NewOrder,
        Operation::UpdateStock,
    ];

    /// Relative sampling weight; the weights sum to 100.
    pub const fn weight(self) -> u32 {
        match self {
            Operation::NewCustomer => 20,
            Operation::NewProduct => 15,
            Operation::NewOrder => 50,
            Operation::UpdateStock => 15,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::NewCustomer => "new_customer",
            Operation::NewProduct => "new_product",
            Operation::NewOrder => "new_order",
            Operation::UpdateStock => "update_stock",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Samples operations from the weighted distribution.
#[derive(Debug, Clone)]
pub struct OperationSampler {
    index: WeightedIndex<u32>,
}

impl OperationSampler {
    pub fn new() -> Result<Self, PopulatorError> {
        let index = WeightedIndex::new(Operation::ALL.iter().map(|op| op.weight()))?;
        Ok(Self { index })
    }

    pub fn sample<R: Rng>(&self, rng: &mut R) -> Operation {
        Operation::ALL[self.index.sample(rng)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;

    #[test]
    fn test_order_total_rounding() {
        assert_eq!(order_total(Decimal::new(1999, 2), 3), Decimal::new(5997, 2));
        assert_eq!(order_total(Decimal::new(500, 2), 1), Decimal::new(500, 2));
        assert_eq!(order_total(Decimal::new(20_000, 2), 5), Decimal::new(100_000, 2));
    }

    #[test]
    fn test_order_total_matches_price_times_quantity() {
        let mut rng = StdRng::seed_from_u64(42);
        let products = vec![
            ProductPrice { id: 1, price: Decimal::new(1234, 2) },
            ProductPrice { id: 2, price: Decimal::new(999, 2) },
        ];
        for _ in 0..200 {
            let order = NewOrder::sample(&mut rng, &[10, 11, 12], &products).unwrap();
            let product = products.iter().find(|p| p.id == order.product_id).unwrap();
            assert!((1..=5).contains(&order.quantity));
            assert_eq!(
                order.total,
                (product.price * Decimal::from(order.quantity)).round_dp(2)
            );
            assert!([10, 11, 12].contains(&order.customer_id));
        }
    }

    #[test]
    fn test_order_sample_requires_rows() {
        let mut rng = StdRng::seed_from_u64(42);
        let products = vec![ProductPrice { id: 1, price: Decimal::ONE }];
        assert!(matches!(
            NewOrder::sample(&mut rng, &[], &products),
            Err(PopulatorError::EmptySample("customer"))
        ));
        assert!(matches!(
            NewOrder::sample(&mut rng, &[1], &[]),
            Err(PopulatorError::EmptySample("product"))
        ));
    }

    #[test]
    fn test_stock_update_bounds() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..500 {
            let update = StockUpdate::sample(&mut rng, &[3, 4]).unwrap();
            assert!((5..=100).contains(&update.stock));
            assert!([3, 4].contains(&update.product_id));
        }
        assert!(StockUpdate::sample(&mut rng, &[]).is_err());
    }

    #[test]
    fn test_weights_sum_to_one_hundred() {
        let total: u32 = Operation::ALL.iter().map(|op| op.weight()).sum();
        assert_eq!(total, 100);
    }

    #[test]
    fn test_sampler_follows_weights() {
        let sampler = OperationSampler::new().unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let mut counts: HashMap<Operation, u32> = HashMap::new();
        let draws = 100_000;
        for _ in 0..draws {
            *counts.entry(sampler.sample(&mut rng)).or_default() += 1;
        }
        for op in Operation::ALL {
            let observed = f64::from(counts[&op]) / f64::from(draws);
            let expected = f64::from(op.weight()) / 100.0;
            assert!(
                (observed - expected).abs() < 0.01,
                "{op}: observed {observed}, expected {expected}"
            );
        }
    }

    #[test]
    fn test_generated_product_in_bounds() {
        let mut rng = StdRng::seed_from_u64(1);
        let product = NewProduct::generate(&mut rng);
        assert!(product.price >= Decimal::new(500, 2));
        assert!((5..=100).contains(&product.stock));
    }
}
