use chrono::Local;
use env_logger::Builder;
use gstools::{
    covmodel::{CovModelKind, CovParamsBuilder, Exponential},
    field::{RandMethSettingsBuilder, Srf, SrfSettingsBuilder},
    variogram::estimate_structured,
};
use log::{info, warn};
use nalgebra::DVector;
use plotters::prelude::*;
use std::{fs::create_dir, io::prelude::*, path::Path};

fn main() {
    Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] - {}",
                Local::now().format("%Y-%m-%dT%H:%M:%S.%f"),
                record.level(),
                record.args()
            )
        })
        .filter(None, log::LevelFilter::Info)
        .init();

    const SIZE_X: usize = 200;
    const SIZE_Y: usize = 100;

    let model: CovModelKind<f64> = Exponential::new(
        CovParamsBuilder::default()
            .dim(2)
            .var(1.0)
            .len_scale(8.0)
            .anis(vec![0.5])
            .angles(vec![std::f64::consts::FRAC_PI_8])
            .build()
            .unwrap(),
    )
    .into();

    let settings = SrfSettingsBuilder::default()
        .mean(0.0)
        .randmeth(
            RandMethSettingsBuilder::default()
                .mode_no(1000)
                .seed(19970221)
                .build()
                .unwrap(),
        )
        .build()
        .unwrap();

    let mut srf = Srf::new(model, &settings).unwrap();

    let axis_x = DVector::from_iterator(SIZE_X, (0..SIZE_X).map(|idx| idx as f64));
    let axis_y = DVector::from_iterator(SIZE_Y, (0..SIZE_Y).map(|idx| idx as f64));

    let field = srf.structured(&[axis_x, axis_y]).unwrap().clone();

    info!(
        "generated {} with sample mean {:.3} and sample variance {:.3}",
        srf.generator(),
        field.sample_mean(),
        field.sample_variance()
    );

    let vario = estimate_structured(&field, 0).unwrap();

    let path = Path::new("demos").join("output").join("plot_srf");

    let base_dir_opt = if path.exists() {
        Some(path)
    } else {
        if path.parent().unwrap().parent().unwrap().exists() {
            create_dir(path.parent().unwrap()).ok();
            create_dir(&path).expect("failed to create output directory");

            Some(path)
        } else {
            warn!(
                "path {} not found, results will not be saved",
                path.into_os_string().into_string().unwrap()
            );

            None
        }
    };

    if let Some(base_dir) = base_dir_opt {
        field.save(base_dir.join("srf.json5")).unwrap();

        let path = base_dir.join("srf.png");

        let root = BitMapBackend::new(&path, (4 * SIZE_X as u32, 4 * SIZE_Y as u32))
            .into_drawing_area();
        root.fill(&WHITE).unwrap();

        let (min, max) = (field.min(), field.max());

        for ix in 0..SIZE_X {
            for iy in 0..SIZE_Y {
                let value = (field.get(&[ix, iy]).unwrap() - min) / (max - min);
                let (x, y) = (4 * ix as i32, 4 * (SIZE_Y - 1 - iy) as i32);

                root.draw(&Rectangle::new(
                    [(x, y), (x + 4, y + 4)],
                    HSLColor(0.7 * (1.0 - value), 0.8, 0.5).filled(),
                ))
                .unwrap();
            }
        }

        root.present().unwrap();

        let path = base_dir.join("variogram.png");

        let root = BitMapBackend::new(&path, (1024, 512)).into_drawing_area();
        root.fill(&WHITE).unwrap();

        let mut chart = ChartBuilder::on(&root)
            .caption("Structured variogram (x-axis)", ("sans-serif", 40).into_font())
            .margin(5)
            .x_label_area_size(30)
            .y_label_area_size(30)
            .build_cartesian_2d(0.0..50.0, 0.0..1.5)
            .unwrap();

        chart.configure_mesh().draw().unwrap();

        chart
            .draw_series(LineSeries::new(
                vario
                    .bin_centers()
                    .iter()
                    .zip(vario.gamma().iter())
                    .take(50)
                    .map(|(lag, gamma)| (*lag, *gamma)),
                &RED,
            ))
            .unwrap()
            .label("Empirical variogram")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &RED));

        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()
            .unwrap();

        root.present().unwrap();
    }
}
