//! Shape command - prints the shape hash a query resolves to.

use anyhow::Result;
use shapewise::{ShapewiseError, derive_shape_key, query_shape};

use super::query::QueryArgs;

pub fn run(args: &QueryArgs, debug_shape: bool) -> Result<()> {
    let query = args.to_query()?;
    let key = derive_shape_key(&query).map_err(ShapewiseError::from)?;

    println!("{key}");
    if debug_shape {
        let shape = query_shape(&query).map_err(ShapewiseError::from)?;
        println!("{}", serde_json::to_string_pretty(&shape)?);
    }

    Ok(())
}
