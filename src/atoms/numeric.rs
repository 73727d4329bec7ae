//! Numeric demo atoms used to exercise the storage layer

use crate::atom::{Atom, AtomType, FieldSpec, TaskContext, ValueType};
use crate::core::error::AtomError;
use anyhow::anyhow;
use async_trait::async_trait;
use rand::Rng;
use serde_json::{json, Value};
use std::collections::HashMap;

pub fn generate_random_series() -> AtomType {
    AtomType::builder("GenerateRandomSeriesTask")
        .describe(
            "Populate a column of 'sample_size' random values between zero and 'rand_range'",
        )
        .param(FieldSpec::with_default("sample_size", ValueType::Int, json!(10)))
        .param(FieldSpec::with_default("rand_range", ValueType::Int, json!(100)))
        .validate(|params| {
            let range = params.int("rand_range").map_err(|e| e.to_string())?;
            let size = params.int("sample_size").map_err(|e| e.to_string())?;
            if range <= 0 {
                return Err(format!("rand_range must be positive, got {range}"));
            }
            if size < 0 {
                return Err(format!("sample_size cannot be negative, got {size}"));
            }
            Ok(())
        })
        .output("numbers", ValueType::Int)
        .new_document()
        .build(|params| {
            Ok(Box::new(GenerateRandomSeries {
                sample_size: usize::try_from(params.int("sample_size")?)?,
                rand_range: params.int("rand_range")?,
            }))
        })
}

struct GenerateRandomSeries {
    sample_size: usize,
    rand_range: i64,
}

impl GenerateRandomSeries {
    fn sample(&self) -> Vec<Value> {
        let mut rng = rand::rng();
        (0..self.sample_size)
            .map(|_| json!(rng.random_range(0..self.rand_range)))
            .collect()
    }
}

#[async_trait]
impl Atom for GenerateRandomSeries {
    async fn task_body(&mut self, task: &mut TaskContext<'_>) -> Result<(), AtomError> {
        let numbers = self.sample();
        task.set_output("numbers", numbers)?;
        Ok(())
    }
}

pub fn list_prime_factors() -> AtomType {
    AtomType::builder("ListPrimeFactorsTask")
        .describe("List the divisors of each input number between 2 and n-2")
        .input("to_factor", ValueType::Int)
        .output("factors", ValueType::List)
        .build(|_| Ok(Box::new(ListPrimeFactors)))
}

struct ListPrimeFactors;

/// Divisors of `num` strictly between 1 and `num`, ascending
fn factorize(num: i64) -> Vec<i64> {
    let mut low = Vec::new();
    let mut high = Vec::new();
    let mut i: i64 = 2;
    while num >= 4 && i <= num / i {
        if num % i == 0 {
            low.push(i);
            let pair = num / i;
            if pair != i {
                high.push(pair);
            }
        }
        i += 1;
    }
    low.extend(high.into_iter().rev());
    low
}

#[async_trait]
impl Atom for ListPrimeFactors {
    async fn task_body(&mut self, task: &mut TaskContext<'_>) -> Result<(), AtomError> {
        let factors = task
            .input("to_factor")?
            .iter()
            .map(|v| match v {
                Value::Null => Ok(Value::Null),
                v => v
                    .as_i64()
                    .map(|n| json!(factorize(n)))
                    .ok_or_else(|| anyhow!("cannot factor {}", v)),
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        task.set_output("factors", factors)?;
        Ok(())
    }
}

pub fn count_items() -> AtomType {
    AtomType::builder("CountItemsTask")
        .describe("Count the number of items stored in a list")
        .input("to_count", ValueType::List)
        .output("counted", ValueType::Int)
        .build(|_| Ok(Box::new(CountItems)))
}

struct CountItems;

#[async_trait]
impl Atom for CountItems {
    async fn task_body(&mut self, task: &mut TaskContext<'_>) -> Result<(), AtomError> {
        let counted = task
            .input("to_count")?
            .iter()
            .map(|v| v.as_array().map(|items| json!(items.len())).unwrap_or(Value::Null))
            .collect();
        task.set_output("counted", counted)?;
        Ok(())
    }
}

pub fn divisible_by_n() -> AtomType {
    AtomType::builder("DivisibleByNTask")
        .describe("Calculate whether or not a number is divisible by 'n'")
        .param(FieldSpec::with_default("n", ValueType::Int, json!(2)))
        .validate(|params| match params.int("n") {
            Ok(0) => Err("n cannot be zero".to_string()),
            Ok(_) => Ok(()),
            Err(e) => Err(e.to_string()),
        })
        .input("to_divide", ValueType::Int)
        .output("divisible", ValueType::Bool)
        .build(|params| Ok(Box::new(DivisibleByN { n: params.int("n")? })))
}

struct DivisibleByN {
    n: i64,
}

#[async_trait]
impl Atom for DivisibleByN {
    async fn task_body(&mut self, task: &mut TaskContext<'_>) -> Result<(), AtomError> {
        let n = self.n;
        let divisible = task
            .input("to_divide")?
            .iter()
            .map(|v| {
                v.as_i64()
                    // Only i64::MIN % -1 overflows, and it divides evenly
                    .map(|x| json!(x.checked_rem(n).map_or(true, |r| r == 0)))
                    .unwrap_or(Value::Null)
            })
            .collect();
        task.set_output("divisible", divisible)?;
        Ok(())
    }
}

pub fn most_common() -> AtomType {
    AtomType::builder("MostCommonTask")
        .describe("Take a column of lists and return the top_n most common elements")
        .param(FieldSpec::with_default("top_n", ValueType::Int, json!(5)))
        .input("to_count", ValueType::List)
        .output("top_elements", ValueType::Any)
        .new_document()
        .build(|params| Ok(Box::new(MostCommon { top_n: params.int("top_n")? })))
}

struct MostCommon {
    top_n: i64,
}

/// Elements ordered by descending frequency, ties broken by first appearance
fn rank_elements(lists: &[Value]) -> Vec<Value> {
    let mut order: Vec<Value> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();
    for item in lists.iter().filter_map(Value::as_array).flatten() {
        let key = item.to_string();
        let count = counts.entry(key).or_insert(0);
        if *count == 0 {
            order.push(item.clone());
        }
        *count += 1;
    }
    // Stable sort keeps first-appearance order among equal counts
    order.sort_by_key(|item| std::cmp::Reverse(counts.get(&item.to_string()).copied().unwrap_or(0)));
    order
}

#[async_trait]
impl Atom for MostCommon {
    async fn task_body(&mut self, task: &mut TaskContext<'_>) -> Result<(), AtomError> {
        let mut top = rank_elements(task.input("to_count")?);
        if self.top_n > 0 {
            top.truncate(self.top_n as usize);
        }
        task.set_output("top_elements", top)?;
        Ok(())
    }
}
