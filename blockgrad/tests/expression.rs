#![cfg(test)]
use blockgrad::{ClipMode, Graph, GraphConfig, GraphError, Result};

#[test]
fn formula() -> Result<()> {
    let graph = Graph::new();
    let x = graph.variable("x");
    let y = graph.variable("y");
    let z = graph.variable("z");
    let f = x.pow(2.0) + y * z;
    assert_eq!(f.to_string(), "x ^ 2 + y * z");
    assert_eq!(f.eval([("x", 3.0), ("y", 4.0), ("z", 5.0)])?, 29.0);

    let df_dx = f.deriv("x")?;
    assert_eq!(df_dx.to_string(), "2 * x ^ 1 * 1");
    assert_eq!(df_dx.eval([("x", 3.0)])?, 6.0);

    f.forward()?;
    f.backward()?;
    assert_eq!(x.grad(), Some(6.0));
    Ok(())
}

#[test]
fn formula_m() -> Result<()> {
    let graph = Graph::new();
    let m = graph.variable("m");
    let n = graph.variable("n");
    let h = graph.variable("h");
    let fm = -(m.pow(2.0)) * n + h / m + m * n * h;
    assert_eq!(fm.to_string(), "-(m ^ 2) * n + h / m + m * n * h");
    let value = fm.eval([("m", 3.0), ("n", 4.0), ("h", 5.0)])?;
    assert!((value - 77.0 / 3.0).abs() < 1e-12, "{value}");

    let dfm_dm = fm.deriv("m")?;
    let symbolic = dfm_dm.eval([("m", 3.0)])?;
    assert!((symbolic + 41.0 / 9.0).abs() < 1e-12, "{symbolic}");

    // m is still 3, and n and h are unchanged
    let numeric = fm.eval_gradient("m")?;
    assert!((numeric - symbolic).abs() < 1e-12, "{numeric} != {symbolic}");
    graph.reset_gradients();
    assert_eq!(fm.eval_gradient("n")?, -9.0 + 15.0);
    Ok(())
}

#[test]
fn round_protocol() -> Result<()> {
    let graph = Graph::new();
    let a = graph.variable("a");
    let b = graph.variable("b");
    let f = a * b + a;
    f.eval([("a", 2.0), ("b", 3.0)])?;

    f.backward()?;
    assert_eq!(a.grad(), Some(4.0));
    // repeated backward accumulates
    f.backward()?;
    assert_eq!(a.grad(), Some(8.0));

    graph.begin_round();
    assert_eq!(a.grad(), Some(0.0));
    assert!(matches!(f.backward(), Err(GraphError::StaleCache { .. })));
    f.forward()?;
    f.backward()?;
    assert_eq!(a.grad(), Some(4.0));
    assert_eq!(b.grad(), Some(2.0));
    Ok(())
}

/// `update` steps along the gradient, so repeated rounds climb to the
/// maximum of `-(x - 3) ^ 2`.
fn climb(config: GraphConfig, start: f64, rounds: usize) -> Result<f64> {
    let graph = Graph::with_config(config).expect("valid config");
    let x = graph.variable("x");
    let objective = -((x - 3.0).pow(2.0));
    x.set(start)?;
    for _ in 0..rounds {
        graph.begin_round();
        objective.forward()?;
        objective.backward()?;
        objective.update(0.1)?;
    }
    Ok(x.value().unwrap_or(f64::NAN))
}

#[test]
fn update_climbs() -> Result<()> {
    let ceiling = GraphConfig {
        default_clip: 0.5,
        ..GraphConfig::default()
    };
    assert_eq!(climb(ceiling.clone(), 0.0, 10)?, 3.0);
    // negative steps are not bounded: 5 -> 1, then up by 0.5
    assert_eq!(climb(ceiling.clone(), 5.0, 1)?, 1.0);
    assert_eq!(climb(ceiling, 5.0, 10)?, 3.0);

    let symmetric = GraphConfig {
        default_clip: 0.5,
        clip_mode: ClipMode::Symmetric,
        ..GraphConfig::default()
    };
    assert_eq!(climb(symmetric.clone(), 5.0, 1)?, 4.5);
    assert_eq!(climb(symmetric, 5.0, 10)?, 3.0);
    Ok(())
}

#[test]
fn derivative_of_derivative() -> Result<()> {
    let graph = Graph::new();
    let x = graph.variable("x");
    let f = x.pow(3.0);
    x.set(2.0)?;
    let d2 = f.deriv("x")?.deriv("x")?;
    assert_eq!(d2.forward()?, 12.0);
    Ok(())
}
