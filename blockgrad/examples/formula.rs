use blockgrad::{config, Graph};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let graph = Graph::with_config(config::from_env()?)?;

    let x = graph.variable("x");
    let y = graph.variable("y");
    let z = graph.variable("z");
    let f = x.pow(2.0) + y * z;
    println!("Formula of f: {f}");
    println!("Result of f: {}", f.eval([("x", 3.0), ("y", 4.0), ("z", 5.0)])?);
    let df_dx = f.deriv("x")?;
    println!("Formula of df/dx: {df_dx}");
    println!("Gradient of x: {}", df_dx.eval([("x", 3.0)])?);

    println!("\nThe gradient of x also can be directly calculated by backward method");
    // outputs must belong to the current round before backward
    f.forward()?;
    f.backward()?;
    println!("Gradient of x: {}", x.grad().unwrap_or_default());

    println!("\n-----------More Complex Case--------------\n");

    let m = graph.variable("m");
    let n = graph.variable("n");
    let h = graph.variable("h");
    let fm = -(m.pow(2.0)) * n + h / m + m * n * h;
    println!("Formula of fm: {fm}");
    println!("Result of fm: {}", fm.eval([("m", 3.0), ("n", 4.0), ("h", 5.0)])?);
    let dfm_dm = fm.deriv("m")?;
    println!("Formula of dfm/dm: {dfm_dm}");
    println!("Gradient of m: {}", dfm_dm.eval([("m", 3.0)])?);
    Ok(())
}
