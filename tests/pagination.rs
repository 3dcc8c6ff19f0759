//! Pagination behaviour through the public API
//!
//! Content rows carry a unique colour so pages can be stitched back together
//! and compared with the fed strip row for row.

use image::{Rgb, RgbImage};
use proptest::prelude::*;
use zwc_book::{OutputPage, Paginator, PaginatorOptions};

const INK: Rgb<u8> = Rgb([40, 40, 40]);
const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

fn ink_tile(width: u32, height: u32) -> RgbImage {
    RgbImage::from_pixel(width, height, INK)
}

fn blank_tile(width: u32, height: u32) -> RgbImage {
    RgbImage::from_pixel(width, height, WHITE)
}

/// Tile whose rows are ink except for `blank` (a range of row indices)
fn tile_with_band(width: u32, height: u32, blank: std::ops::Range<u32>) -> RgbImage {
    RgbImage::from_fn(width, height, |_, y| if blank.contains(&y) { WHITE } else { INK })
}

fn row(image: &RgbImage, y: u32) -> &[u8] {
    let stride = image.width() as usize * 3;
    let start = y as usize * stride;
    &image.as_raw()[start..start + stride]
}

fn is_white(row: &[u8]) -> bool {
    row.iter().all(|&b| b == 255)
}

fn device_options() -> PaginatorOptions {
    PaginatorOptions {
        page_width: 800,
        page_height: 600,
        canvas_height: 3000,
        grow_canvas: false,
        blank_threshold: 220,
    }
}

fn run(options: PaginatorOptions, tiles: &[RgbImage]) -> (Vec<OutputPage>, u32) {
    let mut paginator = Paginator::new(options).unwrap();
    for tile in tiles {
        paginator.append(tile).unwrap();
    }
    let result = paginator.finish();
    (result.pages, result.page_count)
}

#[test]
fn test_three_tiles_with_band_between_second_and_third() {
    let tiles = [
        ink_tile(800, 300),
        ink_tile(800, 300),
        blank_tile(800, 10),
        ink_tile(800, 300),
    ];
    let (pages, count) = run(device_options(), &tiles);

    assert_eq!(count, 2);
    assert_eq!(pages.len(), 2);

    // First page is exactly the first two tiles
    assert_eq!(pages[0].content_rows, 600);
    assert!((0..600).all(|y| row(&pages[0].image, y) == row(&tiles[0], 0)));

    // Second page starts with the band, then the whole third tile
    let second = &pages[1].image;
    assert!((0..10).all(|y| is_white(row(second, y))));
    assert!((10..310).all(|y| !is_white(row(second, y))));
    assert!((310..600).all(|y| is_white(row(second, y))));
}

#[test]
fn test_band_at_bottom_of_second_tile_ends_first_page() {
    let tiles = [
        ink_tile(800, 300),
        tile_with_band(800, 300, 290..300),
        ink_tile(800, 300),
    ];
    let (pages, count) = run(device_options(), &tiles);

    assert_eq!(count, 2);
    assert_eq!(pages[0].content_rows, 600);
    assert!(is_white(row(&pages[0].image, 599)));
    assert!(!is_white(row(&pages[1].image, 0)));
}

#[test]
fn test_cut_lands_in_band_not_mid_tile() {
    // 250 ink, 10 blank, 40 ink: the page holds everything through the band
    let tiles = [ink_tile(800, 300), tile_with_band(800, 300, 250..260)];
    let (pages, count) = run(device_options(), &tiles);

    assert_eq!(count, 2);
    assert_eq!(pages[0].content_rows, 560);
    assert!(is_white(row(&pages[0].image, 559)));
    assert!(!is_white(row(&pages[0].image, 549)));

    // The 40 ink rows after the band open the next page
    assert!((0..40).all(|y| !is_white(row(&pages[1].image, y))));
    assert!(is_white(row(&pages[1].image, 40)));
}

#[test]
fn test_no_blank_row_forces_full_page_cut() {
    let tiles = [ink_tile(800, 1300)];
    let (pages, _) = run(device_options(), &tiles);

    assert_eq!(pages[0].content_rows, 600);
    assert_eq!(pages[1].content_rows, 600);
    assert!(pages.iter().all(|p| p.image.dimensions() == (800, 600)));
}

#[test]
fn test_exact_page_of_content_is_followed_by_blank_page() {
    let (pages, count) = run(device_options(), &[ink_tile(800, 600)]);

    assert_eq!(count, 2);
    assert_eq!(pages[0].content_rows, 600);
    assert!((0..600).all(|y| is_white(row(&pages[1].image, y))));
}

#[test]
fn test_empty_feed_is_one_blank_page() {
    let (pages, count) = run(device_options(), &[]);

    assert_eq!(count, 1);
    assert_eq!(pages[0].image.dimensions(), (800, 600));
    assert!((0..600).all(|y| is_white(row(&pages[0].image, y))));
}

#[test]
fn test_overflow_without_growth() {
    let mut paginator = Paginator::new(device_options()).unwrap();
    // Content never drains below a page, so 3000 + 1 rows cannot fit at once
    assert!(paginator.append(&ink_tile(800, 3001)).is_err());
}

#[test]
fn test_streaming_consumer_sees_pages_early() {
    let mut paginator = Paginator::new(device_options()).unwrap();
    paginator.append(&ink_tile(800, 650)).unwrap();

    let early = paginator.take_ready();
    assert_eq!(early.len(), 1);
    assert_eq!(early[0].number, 1);

    let rest = paginator.finish();
    assert_eq!(rest.page_count, 2);
    assert_eq!(rest.pages.len(), 1);
    assert_eq!(rest.pages[0].number, 2);
}

/// Row `i` of the fed strip: unique non-blank colour, or white
fn strip_row(i: u32, blank: bool) -> Rgb<u8> {
    if blank {
        WHITE
    } else {
        Rgb([(i % 200) as u8, ((i / 200) % 200) as u8, 7])
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_rows_are_conserved(
        tiles in prop::collection::vec(
            prop::collection::vec(any::<bool>(), 1..70),
            0..12
        )
    ) {
        let options = PaginatorOptions {
            page_width: 4,
            page_height: 20,
            canvas_height: 40,
            grow_canvas: true,
            blank_threshold: 220,
        };

        // Each tile is a list of rows; `true` marks a blank row
        let mut strip: Vec<Rgb<u8>> = Vec::new();
        let mut paginator = Paginator::new(options).unwrap();
        for rows in &tiles {
            let first = strip.len() as u32;
            let colours: Vec<Rgb<u8>> = rows
                .iter()
                .enumerate()
                .map(|(offset, &blank)| strip_row(first + offset as u32, blank))
                .collect();
            let tile = RgbImage::from_fn(4, colours.len() as u32, |_, y| colours[y as usize]);
            paginator.append(&tile).unwrap();
            strip.extend(colours);
        }

        let appended = paginator.appended_rows();
        let result = paginator.finish();
        prop_assert_eq!(appended, strip.len() as u64);

        let consumed: u64 = result.pages.iter().map(|p| p.content_rows as u64).sum();
        prop_assert_eq!(
            consumed + result.discarded_rows as u64,
            appended + result.padding_rows as u64
        );

        // Stitch pages back together: the fed strip, then white padding
        let mut stitched: Vec<Rgb<u8>> = Vec::new();
        for page in &result.pages {
            prop_assert!(page.content_rows >= 1 && page.content_rows <= 20);
            for y in 0..page.content_rows {
                stitched.push(*page.image.get_pixel(0, y));
            }
            for y in page.content_rows..20 {
                prop_assert_eq!(*page.image.get_pixel(0, y), WHITE);
            }
        }
        prop_assert!(stitched.len() >= strip.len());
        prop_assert_eq!(&stitched[..strip.len()], &strip[..]);
        prop_assert!(stitched[strip.len()..].iter().all(|&p| p == WHITE));
    }

    #[test]
    fn prop_short_cuts_end_on_blank_rows(
        rows in prop::collection::vec(any::<bool>(), 1..200)
    ) {
        let options = PaginatorOptions {
            page_width: 3,
            page_height: 16,
            canvas_height: 32,
            grow_canvas: true,
            blank_threshold: 220,
        };
        let tile = RgbImage::from_fn(3, rows.len() as u32, |_, y| {
            strip_row(y, rows[y as usize])
        });

        let mut paginator = Paginator::new(options).unwrap();
        paginator.append(&tile).unwrap();
        let result = paginator.finish();

        for page in &result.pages {
            let last = page.content_rows - 1;
            if page.content_rows < 16 {
                // Cut right after a blank row
                prop_assert_eq!(*page.image.get_pixel(0, last), WHITE);
            } else if *page.image.get_pixel(0, last) != WHITE {
                // Forced cut: nothing on the page was blank
                prop_assert!((0..16).all(|y| *page.image.get_pixel(0, y) != WHITE));
            }
        }
    }
}
