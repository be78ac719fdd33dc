//! Chart summaries over a full source set. These never look at the filtered
//! view, so charts stay put while the table is being filtered.

use std::collections::HashMap;

use serde::Serialize;

use crate::domain::entities::employee::Employee;
use crate::domain::entities::record::Record;

/// Label for rows whose category field is null or blank.
pub const UNCATEGORIZED: &str = "Unassigned";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabeledValue {
    pub label: String,
    pub value: f64,
}

/// One entry per distinct value of `field`, in order of first appearance.
pub fn count_by_category<R: Record>(records: &[R], field: &str) -> Vec<CategoryCount> {
    let mut counts: Vec<CategoryCount> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for record in records {
        let value = record.field(field).display();
        let category = if value.trim().is_empty() {
            UNCATEGORIZED.to_string()
        } else {
            value
        };
        match positions.get(&category) {
            Some(&pos) => counts[pos].count += 1,
            None => {
                positions.insert(category.clone(), counts.len());
                counts.push(CategoryCount { category, count: 1 });
            }
        }
    }

    counts
}

/// One entry per record id, labelled by `label`, in order of first
/// appearance. Records that share a label stay separate. A `None` from the
/// selector counts as zero.
pub fn sum_numeric_by_entity<R, L, V>(records: &[R], label: L, value: V) -> Vec<LabeledValue>
where
    R: Record,
    L: Fn(&R) -> String,
    V: Fn(&R) -> Option<f64>,
{
    let mut sums: Vec<LabeledValue> = Vec::new();
    let mut positions: HashMap<i64, usize> = HashMap::new();

    for record in records {
        let amount = value(record).filter(|v| v.is_finite()).unwrap_or(0.0);
        match positions.get(&record.id()) {
            Some(&pos) => sums[pos].value += amount,
            None => {
                positions.insert(record.id(), sums.len());
                sums.push(LabeledValue {
                    label: label(record),
                    value: amount,
                });
            }
        }
    }

    sums
}

/// "Tasks per employee" chart: to-do plus in-progress tasks for each person.
pub fn outstanding_tasks_per_employee(employees: &[Employee]) -> Vec<LabeledValue> {
    sum_numeric_by_entity(employees, Employee::full_name, |employee| {
        Some(employee.outstanding_tasks() as f64)
    })
}

pub fn total(values: &[LabeledValue]) -> f64 {
    values.iter().map(|entry| entry.value).sum()
}
