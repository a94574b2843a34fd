use at91_pclk::PcrLayout;

#[derive(clap::Args, Debug)]
pub struct LayoutsOpts {}

impl crate::ToolRun for LayoutsOpts {
    fn run(&self) -> anyhow::Result<()> {
        println!(
            "{:<10} {:>6} {:>10} {:>10} {:>10} {:>10}",
            "name", "pcr", "cmd", "pid", "div", "gckcss"
        );
        for l in PcrLayout::ALL {
            println!(
                "{:<10} {:>#6x} {:>#10x} {:>#10x} {:>10} {:>10}",
                l.name,
                l.offset,
                l.cmd,
                l.pid_mask,
                mask_or_none(l.div_mask),
                mask_or_none(l.gckcss_mask),
            );
        }
        Ok(())
    }
}

fn mask_or_none(mask: u32) -> String {
    if mask == 0 {
        "-".to_owned()
    } else {
        format!("{:#x}", mask)
    }
}
