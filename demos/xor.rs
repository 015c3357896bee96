use std::sync::{Arc, Mutex};

use nalgebra::dvector;
use textplots::{Chart, Plot, Shape};

use neuramlp::derivable::activation::Tanh;
use neuramlp::derivable::loss::MeanSquaredError;
use neuramlp::initializer::Glorot;
use neuramlp::layer::NeuraDenseLayer;
use neuramlp::network::NeuraNetwork;
use neuramlp::optimizer::Sgd;

const EPOCHS: usize = 2000;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let inputs = vec![
        dvector![0.0, 0.0],
        dvector![0.0, 1.0],
        dvector![1.0, 0.0],
        dvector![1.0, 1.0],
    ];
    let expected = vec![dvector![0.0], dvector![1.0], dvector![1.0], dvector![0.0]];

    let mut network = NeuraNetwork::new(
        Box::new(MeanSquaredError),
        Box::new(Glorot::new(42)),
        Box::new(Sgd::new(1.0)),
        42,
    );
    network.add_layer(Box::new(NeuraDenseLayer::new(2, 2, Box::new(Tanh))))?;
    network.add_layer(Box::new(NeuraDenseLayer::new(2, 1, Box::new(Tanh))))?;
    network.initialize_weights();

    print_predictions("before", &network, &inputs, &expected)?;

    let losses = Arc::new(Mutex::new(Vec::with_capacity(EPOCHS)));
    let capture = Arc::clone(&losses);
    let loss_inputs = inputs.clone();
    let loss_expected = expected.clone();
    network.on_epoch_end(move |network, epoch| {
        let total: f32 = loss_inputs
            .iter()
            .zip(loss_expected.iter())
            .map(|(input, target)| {
                let prediction = network.evaluate(input).unwrap();
                network.loss().eval(&prediction, target).unwrap()
            })
            .sum();
        capture
            .lock()
            .unwrap()
            .push((epoch as f32, total / loss_inputs.len() as f32));
    });

    network.train(&inputs, &expected, EPOCHS, 4, true)?;

    let losses = losses.lock().unwrap();
    println!("\nMean loss per epoch:");
    Chart::new(120, 60, 0.0, EPOCHS as f32)
        .lineplot(&Shape::Lines(&losses))
        .display();

    print_predictions("after", &network, &inputs, &expected)?;

    Ok(())
}

fn print_predictions(
    label: &str,
    network: &NeuraNetwork,
    inputs: &[nalgebra::DVector<f32>],
    expected: &[nalgebra::DVector<f32>],
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Predictions {} training:", label);
    for (input, target) in inputs.iter().zip(expected.iter()) {
        let prediction = network.evaluate(input)?;
        println!(
            "  input: [{}, {}], target: {}, actual: {:.3}",
            input[0], input[1], target[0], prediction[0]
        );
    }
    Ok(())
}
